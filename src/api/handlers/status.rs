use crate::api::responses::{ApiResponse, StatusResponse};
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

pub(crate) async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        tick_seconds: state.config.tick_seconds,
        clusters: state.coordinator.statuses(),
    }))
}
