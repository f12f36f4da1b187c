// src/recommend/pipeline.rs
//! Orchestrator: resolve providers, fan out, dedupe, verify, rank, explain.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::config::recommend::RecommendSettings;
use crate::recommend::error::RecommendError;
use crate::recommend::links::{HttpLinkVerifier, LinkVerifier};
use crate::recommend::postprocess::{self, VerificationMap};
use crate::recommend::providers::{build_providers, SearchProvider};
use crate::recommend::rationale::{attach_reasons, build_rationale, RationaleGenerator};
use crate::recommend::types::{Candidate, ProviderKind, RecommendQuery};
use crate::recommend::{ensure_metrics_described, query_id};

/// Fan-out limit multiplier and floor, to absorb filtering/dedup/verification losses.
const FANOUT_FACTOR: usize = 3;
const FANOUT_MIN: usize = 6;
/// At most `limit * VERIFY_FACTOR` links are probed per request.
const VERIFY_FACTOR: usize = 4;

/// The recommendation pipeline with its collaborators injected.
#[derive(Clone)]
pub struct Recommender {
    providers: Vec<Arc<dyn SearchProvider>>,
    verifier: Arc<dyn LinkVerifier>,
    rationale: Arc<dyn RationaleGenerator>,
}

impl Recommender {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        verifier: Arc<dyn LinkVerifier>,
        rationale: Arc<dyn RationaleGenerator>,
    ) -> Self {
        Self {
            providers,
            verifier,
            rationale,
        }
    }

    /// Production wiring from settings.
    pub fn from_settings(settings: &RecommendSettings) -> anyhow::Result<Self> {
        // No client-wide timeout: the link fallback must stay unbounded.
        let http = reqwest::Client::builder()
            .user_agent(concat!("tolearn-recommender/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;

        let providers = build_providers(settings, &http);
        let verifier: Arc<dyn LinkVerifier> = Arc::new(HttpLinkVerifier::new(http.clone()));
        let rationale = build_rationale(settings, &http);

        let configured: Vec<&str> = providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.kind().as_str())
            .collect();
        info!(
            target: "recommend",
            configured = ?configured,
            rationale = rationale.name(),
            "recommender ready"
        );
        Ok(Self::new(providers, verifier, rationale))
    }

    /// Configured providers, restricted to (and ordered by) `requested` when given.
    pub fn resolve_providers(
        &self,
        requested: Option<&[ProviderKind]>,
    ) -> Vec<Arc<dyn SearchProvider>> {
        let configured: Vec<&Arc<dyn SearchProvider>> =
            self.providers.iter().filter(|p| p.is_configured()).collect();
        match requested {
            Some(kinds) if !kinds.is_empty() => kinds
                .iter()
                .filter_map(|k| configured.iter().find(|p| p.kind() == *k))
                .map(|p| Arc::clone(p))
                .collect(),
            _ => configured.into_iter().cloned().collect(),
        }
    }

    /// Run the full pipeline for one validated request.
    pub async fn recommend(&self, q: &RecommendQuery) -> Result<Vec<Candidate>, RecommendError> {
        ensure_metrics_described();
        let started = Instant::now();
        counter!("recommend_requests_total").increment(1);

        let result = self.run(q).await;

        histogram!("recommend_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
        if let Err(e) = &result {
            counter!("recommend_failures_total", "code" => e.code()).increment(1);
        }
        result
    }

    async fn run(&self, q: &RecommendQuery) -> Result<Vec<Candidate>, RecommendError> {
        let id = query_id(&q.query);

        // 1) effective provider set
        let providers = self.resolve_providers(q.providers.as_deref());
        if providers.is_empty() {
            warn!(target: "recommend", %id, "no configured provider for request");
            return Err(RecommendError::NoProviderAvailable);
        }

        // 2) fan-out
        let fanout_limit = (q.limit * FANOUT_FACTOR).max(FANOUT_MIN);
        let pool = self.collect(&providers, &q.query, fanout_limit).await;
        counter!("recommend_candidates_total").increment(pool.len() as u64);

        // 3)
        if pool.is_empty() {
            info!(target: "recommend", %id, "providers returned nothing");
            return Err(RecommendError::EmptyUpstream);
        }

        // 4) dedup
        let before = pool.len();
        let deduped = postprocess::dedupe(pool);
        counter!("recommend_dedup_removed_total").increment((before - deduped.len()) as u64);

        // 5) verify a bounded prefix
        let targets: Vec<&str> = deduped
            .iter()
            .take(q.limit * VERIFY_FACTOR)
            .map(|c| c.link.as_str())
            .collect();
        let verifications = self.verify(&targets).await;

        // 6) rank
        let selected = postprocess::rank(deduped, &verifications, q.limit);
        if selected.is_empty() {
            return Err(RecommendError::NothingVerified);
        }

        // 7) explain
        let out = attach_reasons(selected, &q.context, self.rationale.as_ref()).await;
        info!(
            target: "recommend",
            %id,
            candidates = before,
            returned = out.len(),
            verified = out.iter().filter(|c| c.verified == Some(true)).count(),
            "recommendation served"
        );
        Ok(out)
    }

    /// Query every provider concurrently. A failing provider contributes nothing;
    /// results are merged in provider order regardless of completion order.
    async fn collect(
        &self,
        providers: &[Arc<dyn SearchProvider>],
        query: &str,
        limit: usize,
    ) -> Vec<Candidate> {
        let calls = providers.iter().map(|p| p.search(query, limit));
        let settled = join_all(calls).await;

        let mut pool = Vec::new();
        for (provider, result) in providers.iter().zip(settled) {
            match result {
                Ok(mut items) => {
                    debug!(
                        target: "recommend",
                        provider = provider.kind().as_str(),
                        count = items.len(),
                        "provider answered"
                    );
                    pool.append(&mut items);
                }
                Err(e) => {
                    warn!(
                        target: "recommend",
                        provider = e.provider(),
                        error = %e,
                        "provider failed"
                    );
                    counter!("recommend_provider_errors_total", "provider" => e.provider())
                        .increment(1);
                }
            }
        }
        pool
    }

    /// Check each distinct link once, concurrently. Every link keeps its own result.
    async fn verify(&self, links: &[&str]) -> VerificationMap {
        let mut seen = HashSet::with_capacity(links.len());
        let unique: Vec<&str> = links.iter().copied().filter(|l| seen.insert(*l)).collect();

        let checks = unique.iter().map(|link| self.verifier.is_reachable(link));
        let results = join_all(checks).await;
        counter!("recommend_links_probed_total").increment(unique.len() as u64);

        let mut map = VerificationMap::with_capacity(unique.len());
        for (link, ok) in unique.into_iter().zip(results) {
            if !ok {
                counter!("recommend_links_unreachable_total").increment(1);
            }
            map.insert(link.to_string(), ok);
        }
        map
    }
}
