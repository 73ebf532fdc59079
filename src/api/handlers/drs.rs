use crate::api::responses::{ApiResponse, CancelResponse, DrsConfigUpdateRequest, RunListQuery};
use crate::balancer::{Algorithm, ClusterId};
use crate::config::ClusterDrsConfig;
use crate::db::RunSummary;
use crate::error::DrsError;
use crate::executor::{DrsPreview, DrsRunReport};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const DEFAULT_RUN_LIST_LIMIT: u32 = 20;
const MAX_RUN_LIST_LIMIT: u32 = 500;

pub(crate) async fn get_drs_config(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
) -> impl IntoResponse {
    match state.db.get_drs_config(cluster_id) {
        Ok(Some(config)) => Json(ApiResponse::ok(config)),
        Ok(None) => Json(ApiResponse::<ClusterDrsConfig>::err(
            DrsError::ConfigNotFound(cluster_id).to_string(),
        )),
        Err(e) => Json(ApiResponse::<ClusterDrsConfig>::err(format!("{e}"))),
    }
}

pub(crate) async fn update_drs_config(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
    Json(req): Json<DrsConfigUpdateRequest>,
) -> impl IntoResponse {
    match state.db.cluster_exists(cluster_id) {
        Ok(true) => {}
        Ok(false) => {
            return Json(ApiResponse::<ClusterDrsConfig>::err(
                DrsError::ClusterNotFound(cluster_id).to_string(),
            ));
        }
        Err(e) => return Json(ApiResponse::<ClusterDrsConfig>::err(format!("{e}"))),
    }

    let mut config = match state.db.get_drs_config(cluster_id) {
        Ok(Some(existing)) => existing,
        Ok(None) => state.config.cluster_defaults.clone(),
        Err(e) => return Json(ApiResponse::<ClusterDrsConfig>::err(format!("{e}"))),
    };

    if let Some(v) = req.enabled {
        config.enabled = v;
    }
    if let Some(v) = req.interval_minutes {
        config.interval_minutes = v;
    }
    if let Some(v) = req.iteration_fraction {
        config.iteration_fraction = v;
    }
    if let Some(v) = req.algorithm {
        config.algorithm = v;
    }
    if let Some(v) = req.threshold {
        config.threshold = v;
    }
    if let Some(v) = req.metric {
        config.metric = v;
    }
    if let Some(v) = req.cpu_overprovisioning {
        config.cpu_overprovisioning = v;
    }
    if let Some(v) = req.memory_overprovisioning {
        config.memory_overprovisioning = v;
    }

    if let Err(e) = config.validate().and_then(|()| Algorithm::from_name(&config.algorithm)) {
        return Json(ApiResponse::<ClusterDrsConfig>::err(e.to_string()));
    }

    match state.db.upsert_drs_config(cluster_id, &config) {
        Ok(()) => {
            info!(
                "DRS config for cluster {} saved: enabled={}, algorithm={}, metric={}, threshold={}",
                cluster_id, config.enabled, config.algorithm, config.metric, config.threshold
            );
            Json(ApiResponse::ok(config))
        }
        Err(e) => Json(ApiResponse::<ClusterDrsConfig>::err(format!(
            "Failed to save DRS config: {e}"
        ))),
    }
}

/// Run DRS now and wait for the report.
pub(crate) async fn run_drs(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
) -> impl IntoResponse {
    match state.coordinator.execute_now(cluster_id).await {
        Ok(report) => Json(ApiResponse::ok(report)),
        Err(e) => Json(ApiResponse::<DrsRunReport>::err(e.to_string())),
    }
}

/// Dry run: the imbalance reading and the plan a run would execute.
pub(crate) async fn preview_drs(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
) -> impl IntoResponse {
    match state.coordinator.executor().preview(cluster_id) {
        Ok(preview) => Json(ApiResponse::ok(preview)),
        Err(e) => Json(ApiResponse::<DrsPreview>::err(e.to_string())),
    }
}

pub(crate) async fn cancel_drs(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
) -> impl IntoResponse {
    let cancel_requested = state.coordinator.cancel(cluster_id);
    if cancel_requested {
        Json(ApiResponse::ok(CancelResponse { cluster_id, cancel_requested }))
    } else {
        Json(ApiResponse::<CancelResponse>::err(format!(
            "No DRS run in progress for cluster {cluster_id}"
        )))
    }
}

pub(crate) async fn list_runs(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
    Query(query): Query<RunListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_RUN_LIST_LIMIT).clamp(1, MAX_RUN_LIST_LIMIT);
    match state.db.list_runs(cluster_id, limit) {
        Ok(runs) => Json(ApiResponse::ok(runs)),
        Err(e) => Json(ApiResponse::<Vec<RunSummary>>::err(format!("{e}"))),
    }
}

pub(crate) async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.db.get_run(run_id) {
        Ok(Some(report)) => Json(ApiResponse::ok(report)),
        Ok(None) => Json(ApiResponse::<DrsRunReport>::err("Run not found")),
        Err(e) => Json(ApiResponse::<DrsRunReport>::err(format!("{e}"))),
    }
}
