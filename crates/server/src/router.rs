use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};
use watch_core::types::{NetworkSelection, NetworkType, UpgradeRecord};

use crate::AppState;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn data_not_available() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Data not available")
}

pub async fn handle_healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "OK" })))
}

fn cached_records(state: &AppState, network_type: NetworkType) -> Response {
    match state.cache.load() {
        Some(snapshot) => (StatusCode::OK, Json(snapshot.records(network_type))).into_response(),
        None => data_not_available(),
    }
}

pub async fn handle_mainnets(State(state): State<AppState>) -> Response {
    cached_records(&state, NetworkType::Mainnet)
}

pub async fn handle_testnets(State(state): State<AppState>) -> Response {
    cached_records(&state, NetworkType::Testnet)
}

/// Records for the networks named in a `{"MAINNETS": [...], "TESTNETS": [...]}` body.
///
/// Served from the cache once it has been populated. Before that, only the requested
/// networks are inspected inline, bounded by `fetch_timeout`.
pub async fn handle_fetch(State(state): State<AppState>, body: Bytes) -> Response {
    let selection: NetworkSelection = match serde_json::from_slice(&body) {
        Ok(selection) => selection,
        Err(e) => {
            debug!(error = %e, "rejecting unparsable fetch payload");
            return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };
    if selection.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
    }

    if let Some(snapshot) = state.cache.load() {
        return (StatusCode::OK, Json(snapshot.select(&selection))).into_response();
    }

    info!(
        mainnets = selection.mainnets.len(),
        testnets = selection.testnets.len(),
        "cache not populated yet, inspecting requested networks inline"
    );
    match tokio::time::timeout(state.fetch_timeout, state.scheduler.inspect_selection(&selection)).await {
        Ok(records) => (StatusCode::OK, Json::<Vec<UpgradeRecord>>(records)).into_response(),
        Err(_) => {
            warn!(timeout_secs = state.fetch_timeout.as_secs(), "inline fetch timed out");
            data_not_available()
        }
    }
}

pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Metrics disabled"),
    }
}
