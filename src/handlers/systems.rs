use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

/// List all systems
pub async fn list_systems(State(state): State<Arc<AppState>>) -> Result<Json<Vec<System>>, ApiError> {
    let systems = state.store.list_systems().await?;
    Ok(Json(systems))
}

/// Get a single system by ID
pub async fn get_system(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<System>, ApiError> {
    let system = state
        .store
        .get_system(id)
        .await?
        .ok_or_else(|| ApiError::not_found("system"))?;
    Ok(Json(system))
}

/// Create a new system
pub async fn create_system(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSystemRequest>,
) -> Result<(axum::http::StatusCode, Json<System>), ApiError> {
    if req.system_name.trim().is_empty() {
        return Err(ApiError::bad_request("system_name is required"));
    }
    let system = state.store.create_system(&req).await?;
    tracing::info!(system_id = system.id, node_id = system.node_id, "Created system {}", system.system_name);
    Ok(created(system))
}

/// List the services riding on provisioned paths
pub async fn list_system_connections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SystemConnection>>, ApiError> {
    let connections = state.store.list_system_connections().await?;
    Ok(Json(connections))
}
