//! Community events service: binary entrypoint.
//! Boots the Axum router, the Prometheus endpoint and the discovery scheduler.

use community_events::ingest::scheduler::spawn_discovery_scheduler;
use community_events::metrics::Metrics;
use community_events::{router, App};
use shuttle_axum::ShuttleAxum;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs in development only.
/// Requires a dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
/// and PIPELINE_DEV_LOG=1.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("PIPELINE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("community_events=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // .env in local/dev; no-op in prod.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let metrics = Metrics::init()?;
    let app = App::from_env()?;

    if app.discovery.cfg.sources.is_empty() {
        tracing::warn!(target: "discovery", "no sources configured; scheduler not started");
    } else {
        // Lives as long as the process.
        let cancel = CancellationToken::new();
        spawn_discovery_scheduler(app.discovery, cancel);
    }

    let router = router(app.state).merge(metrics.router());
    Ok(router.into())
}
