//! HTTP read API over the upgrade cache.

pub mod router;

use axum::{
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use watch_core::{
    cache::UpgradeCache, config::AppConfig, metrics::PrometheusHandle, scheduler::RefreshScheduler,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<UpgradeCache>,
    pub scheduler: Arc<RefreshScheduler>,
    /// `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
    /// Budget for an inline detection on `/fetch` before the first snapshot exists.
    pub fetch_timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(
        scheduler: Arc<RefreshScheduler>,
        metrics: Option<PrometheusHandle>,
        fetch_timeout: Duration,
    ) -> Self {
        Self { cache: Arc::clone(scheduler.cache()), scheduler, metrics, fetch_timeout }
    }
}

/// Builds the application router with body limiting and request tracing.
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/healthz", get(router::handle_healthz))
        .route("/mainnets", get(router::handle_mainnets))
        .route("/testnets", get(router::handle_testnets))
        .route("/fetch", post(router::handle_fetch))
        .route("/metrics", get(router::handle_metrics))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}
