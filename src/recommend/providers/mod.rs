// src/recommend/providers/mod.rs
//! Search provider clients. Each one turns `(query, limit)` into candidates from a
//! single external source.

pub mod dart;
pub mod kif_edu;
pub mod tavily;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::recommend::RecommendSettings;
use crate::recommend::error::UpstreamError;
use crate::recommend::types::{Candidate, ProviderKind};

pub use dart::DartProvider;
pub use kif_edu::KifEduProvider;
pub use tavily::TavilyProvider;

/// Search capability shared by every provider.
///
/// `search` returns an empty list when nothing matches or when the provider has no
/// credential; it errors only when the upstream call itself fails.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the provider has the credentials it needs.
    fn is_configured(&self) -> bool;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, UpstreamError>;
}

/// Build every provider from settings, in `ProviderKind::ALL` order.
pub fn build_providers(
    settings: &RecommendSettings,
    http: &reqwest::Client,
) -> Vec<Arc<dyn SearchProvider>> {
    vec![
        Arc::new(TavilyProvider::new(
            http.clone(),
            settings.tavily_api_key.clone(),
            settings.tavily_endpoint.clone(),
        )),
        Arc::new(DartProvider::new(
            http.clone(),
            settings.dart_api_key.clone(),
            settings.dart_endpoint.clone(),
        )),
        Arc::new(KifEduProvider::new(
            http.clone(),
            settings.kif_edu_api_key.clone(),
            settings.kif_edu_base_url.clone(),
            settings.kif_edu_dataset_id.clone(),
        )),
    ]
}

/// Decode entities and collapse whitespace to single spaces.
pub fn clean_text(s: &str) -> String {
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
    let decoded = html_escape::decode_html_entities(s);
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

/// Requested page size bounded to what a provider accepts.
pub(crate) fn page_size(limit: usize, min: usize, max: usize) -> usize {
    limit.clamp(min, max)
}
