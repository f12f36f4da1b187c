// src/recommend/links.rs
//! Link reachability: a bounded HEAD probe, then an unbounded GET fallback.
//!
//! Some servers reject HEAD (403/405) while serving GET fine, so a failed probe is not
//! treated as unreachable on its own. Only the probe carries a timeout; the fallback
//! waits as long as the server takes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reachability capability. Never errors: ambiguity resolves to `false`.
#[async_trait]
pub trait LinkVerifier: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

pub struct HttpLinkVerifier {
    http: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpLinkVerifier {
    /// `http` must not carry a client-wide timeout, or the fallback stops being unbounded.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    async fn probe(&self, url: &str) -> bool {
        match self.http.head(url).timeout(self.probe_timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(target: "recommend", error = %e, "link probe failed; falling back to GET");
                false
            }
        }
    }

    async fn fetch(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(target: "recommend", error = %e, "link fetch failed");
                false
            }
        }
    }
}

#[async_trait]
impl LinkVerifier for HttpLinkVerifier {
    async fn is_reachable(&self, url: &str) -> bool {
        if self.probe(url).await {
            return true;
        }
        self.fetch(url).await
    }
}
