use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError, MessageResponse};

/// List all logical paths
pub async fn list_paths(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LogicalFiberPath>>, ApiError> {
    let paths = state.store.list_logical_paths().await?;
    Ok(Json(paths))
}

/// Get a single logical path by ID
pub async fn get_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<LogicalFiberPath>, ApiError> {
    let path = state
        .store
        .get_logical_path(id)
        .await?
        .ok_or_else(|| ApiError::not_found("logical path"))?;
    Ok(Json(path))
}

/// Create a new logical path
pub async fn create_path(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLogicalPathRequest>,
) -> Result<(StatusCode, Json<LogicalFiberPath>), ApiError> {
    if req.path_name.trim().is_empty() {
        return Err(ApiError::bad_request("path_name is required"));
    }
    let path = state.store.create_logical_path(&req).await?;
    tracing::info!(path_id = path.id, "Created logical path {}", path.path_name);
    Ok(created(path))
}

// ========== Segments ==========

pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PathSegment>>, ApiError> {
    let segments = state.store.list_segments(id).await?;
    Ok(Json(segments))
}

pub async fn add_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AddSegmentRequest>,
) -> Result<(StatusCode, Json<PathSegment>), ApiError> {
    let segment = state.store.add_segment(id, &req).await?;
    Ok(created(segment))
}

pub async fn delete_segment(
    State(state): State<Arc<AppState>>,
    Path(segment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_segment(segment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ReorderSegmentsRequest>,
) -> Result<Json<Vec<PathSegment>>, ApiError> {
    let segments = state.store.reorder_segments(id, &req.segment_ids).await?;
    Ok(Json(segments))
}

// ========== Validation & Provisioning ==========

pub async fn validate_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RingValidation>, ApiError> {
    let validation = state.store.validate_ring_path(id).await?;
    Ok(Json(validation))
}

/// Cables that can extend the path from its current end
pub async fn list_candidate_cables(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Cable>>, ApiError> {
    let cables = state.store.list_candidate_cables(id).await?;
    Ok(Json(cables))
}

#[derive(Serialize)]
pub struct AvailableFibersResponse {
    pub path_id: i64,
    pub fibers: Vec<i64>,
}

/// Fibers free on every cable of the path
pub async fn get_available_fibers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AvailableFibersResponse>, ApiError> {
    let fibers = state.store.get_available_fibers(id).await?;
    Ok(Json(AvailableFibersResponse { path_id: id, fibers }))
}

pub async fn provision_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ProvisionRequest>,
) -> Result<Json<ProvisionResult>, ApiError> {
    let result = state.store.provision_path(id, &req).await?;
    Ok(Json(result))
}

pub async fn deprovision_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let changed = state.store.deprovision_path(id).await?;
    let message = if changed {
        format!("path {} deprovisioned", id)
    } else {
        format!("path {} was not provisioned", id)
    };
    Ok(MessageResponse::new(message))
}
