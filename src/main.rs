//! to-learn recommendation service: binary entrypoint.
//! Boots the Axum HTTP server with the recommend pipeline, health and metrics routes.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tolearn_recommender::config::recommend::RecommendSettings;
use tolearn_recommender::metrics::Metrics;

/// Compact log output. A subscriber installed by the runtime wins; ours is then skipped.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tolearn_recommender=info,recommend=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let settings = RecommendSettings::load()?;
    let mut router = tolearn_recommender::build_app(&settings)?;

    match Metrics::init() {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
