use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

/// List all cables
pub async fn list_cables(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Cable>>, ApiError> {
    let cables = state.store.list_cables().await?;
    Ok(Json(cables))
}

/// Get a single cable by ID
pub async fn get_cable(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Cable>, ApiError> {
    let cable = state
        .store
        .get_cable(id)
        .await?
        .ok_or_else(|| ApiError::not_found("cable"))?;
    Ok(Json(cable))
}

/// Create a new cable
pub async fn create_cable(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCableRequest>,
) -> Result<(axum::http::StatusCode, Json<Cable>), ApiError> {
    if req.route_name.trim().is_empty() {
        return Err(ApiError::bad_request("route_name is required"));
    }
    let cable = state.store.create_cable(&req).await?;
    tracing::info!(cable_id = cable.id, capacity = cable.capacity, "Created cable {}", cable.route_name);
    Ok(created(cable))
}

/// Status of every fiber in a cable
pub async fn list_cable_fibers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<FiberStatusView>>, ApiError> {
    let fibers = state.store.list_cable_fibers(id).await?;
    Ok(Json(fibers))
}

/// Status of one fiber
pub async fn get_fiber_status(
    State(state): State<Arc<AppState>>,
    Path((id, fiber_no)): Path<(i64, i64)>,
) -> Result<Json<FiberStatusView>, ApiError> {
    let status = state.store.get_fiber_status(FiberRef::new(id, fiber_no)).await?;
    Ok(Json(status))
}

/// Physical route of one fiber through every closure
pub async fn trace_fiber(
    State(state): State<Arc<AppState>>,
    Path((id, fiber_no)): Path<(i64, i64)>,
) -> Result<Json<FiberTrace>, ApiError> {
    let trace = state.store.trace_fiber(FiberRef::new(id, fiber_no)).await?;
    Ok(Json(trace))
}

/// The cable joining two nodes, in either direction
pub async fn find_cable_between(
    State(state): State<Arc<AppState>>,
    Path((a, b)): Path<(i64, i64)>,
) -> Result<Json<Cable>, ApiError> {
    let cable = state
        .store
        .find_cable_between_nodes(a, b)
        .await?
        .ok_or_else(|| ApiError::not_found("cable between nodes"))?;
    Ok(Json(cable))
}
