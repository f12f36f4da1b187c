// src/recommend/mod.rs
//! Recommendation aggregation: provider fan-out, link verification, ranking, rationales.

pub mod error;
pub mod links;
pub mod pipeline;
pub mod postprocess;
pub mod providers;
pub mod rationale;
pub mod types;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub use error::{RecommendError, UpstreamError, ValidationError};
pub use pipeline::Recommender;
pub use types::{Candidate, ProviderKind, RecommendQuery, RecommendRequest, RecommendResponse};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("recommend_requests_total", "Recommendation requests handled.");
        describe_counter!(
            "recommend_failures_total",
            "Requests that ended in a client-visible error, by code."
        );
        describe_counter!(
            "recommend_provider_errors_total",
            "Provider calls that failed and were skipped."
        );
        describe_counter!("recommend_candidates_total", "Candidates returned by providers.");
        describe_counter!(
            "recommend_dedup_removed_total",
            "Candidates dropped as duplicates."
        );
        describe_counter!("recommend_links_probed_total", "Links checked for reachability.");
        describe_counter!(
            "recommend_links_unreachable_total",
            "Links that failed both probe and fetch."
        );
        describe_counter!(
            "recommend_rationale_fallback_total",
            "Items that received a templated reason instead of an LLM one."
        );
        describe_histogram!("recommend_duration_ms", "Pipeline time in milliseconds.");
    });
}

/// Short anonymized id for a query. Raw queries never reach the logs.
pub(crate) fn query_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
