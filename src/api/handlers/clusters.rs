use crate::api::responses::{ApiResponse, InventoryAccepted};
use crate::balancer::{ClusterId, ClusterSnapshot};
use crate::db::{Cluster, Inventory};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn get_clusters(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.list_clusters() {
        Ok(clusters) => Json(ApiResponse::ok(clusters)),
        Err(e) => Json(ApiResponse::<Vec<Cluster>>::err(format!("{e}"))),
    }
}

pub(crate) async fn put_inventory(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
    Json(inventory): Json<Inventory>,
) -> impl IntoResponse {
    let hosts = inventory.hosts.len();
    let workloads: usize = inventory.hosts.iter().map(|h| h.workloads.len()).sum();

    match state.db.replace_inventory(cluster_id, &inventory) {
        Ok(()) => {
            info!(
                "Inventory for cluster {} ({}) replaced: {} hosts, {} workloads",
                cluster_id, inventory.name, hosts, workloads
            );
            Json(ApiResponse::ok(InventoryAccepted { cluster_id, hosts, workloads }))
        }
        Err(e) => Json(ApiResponse::<InventoryAccepted>::err(format!("Invalid inventory: {e:#}"))),
    }
}

pub(crate) async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(cluster_id): Path<ClusterId>,
) -> impl IntoResponse {
    match state.db.load_snapshot(cluster_id) {
        Ok(snapshot) => Json(ApiResponse::ok(snapshot)),
        Err(e) => Json(ApiResponse::<ClusterSnapshot>::err(e.to_string())),
    }
}
