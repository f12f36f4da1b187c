// tests/common/mod.rs
// Shared fixtures: a local HTTP server and in-memory pipeline collaborators.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use tolearn_recommender::recommend::error::{RationaleError, UpstreamError};
use tolearn_recommender::recommend::links::LinkVerifier;
use tolearn_recommender::recommend::providers::SearchProvider;
use tolearn_recommender::recommend::rationale::{RationaleGenerator, RationaleItem};
use tolearn_recommender::recommend::{Candidate, ProviderKind, Recommender};

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture server");
    let addr = listener.local_addr().expect("fixture addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    format!("http://{addr}")
}

pub fn cand(source: ProviderKind, title: &str, link: &str) -> Candidate {
    Candidate::new(source, title, format!("{title} 설명"), link).expect("valid candidate")
}

pub struct FakeProvider {
    pub kind: ProviderKind,
    pub configured: bool,
    pub items: Vec<Candidate>,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub last_limit: AtomicUsize,
}

impl FakeProvider {
    pub fn ok(kind: ProviderKind, items: Vec<Candidate>) -> Self {
        Self {
            kind,
            configured: true,
            items,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_limit: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind) -> Self {
        Self {
            fail: true,
            ..Self::ok(kind, Vec::new())
        }
    }

    pub fn unconfigured(kind: ProviderKind) -> Self {
        Self {
            configured: false,
            ..Self::ok(kind, Vec::new())
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<Candidate>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(UpstreamError::Status {
                provider: self.kind.as_str(),
                status: 500,
                body: "upstream exploded".into(),
            });
        }
        Ok(self.items.clone())
    }
}

/// Reachable iff the exact link is in `reachable`.
pub struct FakeVerifier {
    pub reachable: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn new<I: IntoIterator<Item = &'static str>>(reachable: I) -> Self {
        Self {
            reachable: reachable.into_iter().map(str::to_string).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkVerifier for FakeVerifier {
    async fn is_reachable(&self, url: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reachable.contains(url)
    }
}

pub enum RationaleMode {
    Disabled,
    Answer(HashMap<String, String>),
    Fail,
}

pub struct FakeRationale {
    pub mode: RationaleMode,
    pub calls: AtomicUsize,
}

impl FakeRationale {
    pub fn new(mode: RationaleMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RationaleGenerator for FakeRationale {
    fn is_enabled(&self) -> bool {
        !matches!(self.mode, RationaleMode::Disabled)
    }

    async fn generate(
        &self,
        _items: &[RationaleItem],
        _context: &str,
    ) -> Result<HashMap<String, String>, RationaleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            RationaleMode::Answer(map) => Ok(map.clone()),
            RationaleMode::Fail => Err(RationaleError::EmptyCompletion),
            RationaleMode::Disabled => Ok(HashMap::new()),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn recommender(
    providers: Vec<Arc<FakeProvider>>,
    verifier: Arc<FakeVerifier>,
    rationale: Arc<FakeRationale>,
) -> Recommender {
    Recommender::new(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn SearchProvider>)
            .collect(),
        verifier,
        rationale,
    )
}
