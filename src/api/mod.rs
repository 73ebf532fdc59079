mod handlers;
pub(crate) mod responses;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete API router.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        // Status
        .route("/api/status", get(handlers::get_status))
        // Inventory
        .route("/api/clusters", get(handlers::get_clusters))
        .route("/api/clusters/{cluster_id}/inventory", post(handlers::put_inventory))
        .route("/api/clusters/{cluster_id}/snapshot", get(handlers::get_snapshot))
        // DRS
        .route(
            "/api/clusters/{cluster_id}/drs/config",
            get(handlers::get_drs_config).post(handlers::update_drs_config),
        )
        .route("/api/clusters/{cluster_id}/drs/run", post(handlers::run_drs))
        .route("/api/clusters/{cluster_id}/drs/plan", post(handlers::preview_drs))
        .route("/api/clusters/{cluster_id}/drs/cancel", post(handlers::cancel_drs))
        .route("/api/clusters/{cluster_id}/drs/runs", get(handlers::list_runs))
        .route("/api/runs/{run_id}", get(handlers::get_run))
        // SSE events
        .route("/api/events", get(handlers::sse_events))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
