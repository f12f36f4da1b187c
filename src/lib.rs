// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod metrics;
pub mod recommend;

use tracing::info;

use crate::config::recommend::RecommendSettings;

pub use crate::api::router;
pub use crate::recommend::Recommender;

/// Build the full HTTP app (recommend + health routes) from settings.
/// Metrics are mounted separately by the binary, since the recorder is process-global.
pub fn build_app(settings: &RecommendSettings) -> anyhow::Result<axum::Router> {
    let recommender = Recommender::from_settings(settings)?;
    let state = api::AppState::new(recommender, settings.allowed_origins.clone());
    info!(
        origins = settings.allowed_origins.len(),
        "router built"
    );
    Ok(api::router(state))
}
