use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

/// List all junction closures
pub async fn list_junction_closures(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JunctionClosure>>, ApiError> {
    let closures = state.store.list_junction_closures().await?;
    Ok(Json(closures))
}

/// Get a single junction closure by ID
pub async fn get_junction_closure(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<JunctionClosure>, ApiError> {
    let closure = state
        .store
        .get_junction_closure(id)
        .await?
        .ok_or_else(|| ApiError::not_found("junction closure"))?;
    Ok(Json(closure))
}

/// Create a new junction closure
pub async fn create_junction_closure(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJunctionClosureRequest>,
) -> Result<(StatusCode, Json<JunctionClosure>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let closure = state.store.create_junction_closure(&req).await?;
    Ok(created(closure))
}

#[derive(Debug, Deserialize)]
pub struct SplicingQuery {
    /// Comma-separated cable ids to show alongside the cables already present
    #[serde(default)]
    pub cables: Option<String>,
}

fn parse_cable_ids(raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("invalid cable id '{}'", s)))
        })
        .collect()
}

/// Splice matrix of a closure
pub async fn get_splicing_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<SplicingQuery>,
) -> Result<Json<JcSplicingDetails>, ApiError> {
    let extra = parse_cable_ids(query.cables.as_deref())?;
    let details = state.store.get_jc_splicing_details(id, &extra).await?;
    Ok(Json(details))
}

/// Status of one fiber end inside a closure
pub async fn get_fiber_status_at(
    State(state): State<Arc<AppState>>,
    Path((id, cable_id, fiber_no)): Path<(i64, i64, i64)>,
) -> Result<Json<FiberStatusView>, ApiError> {
    let status = state
        .store
        .get_fiber_status_at(id, FiberRef::new(cable_id, fiber_no))
        .await?;
    Ok(Json(status))
}

/// Record a splice in a closure
pub async fn create_splice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<CreateSpliceRequest>,
) -> Result<(StatusCode, Json<Splice>), ApiError> {
    let splice = state.store.create_splice(id, &req).await?;
    Ok(created(splice))
}

/// Delete a splice; deleting one that is already gone succeeds
pub async fn delete_splice(
    State(state): State<Arc<AppState>>,
    Path((id, splice_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_splice(id, splice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Splice two cables fiber-for-fiber
pub async fn auto_splice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AutoSpliceRequest>,
) -> Result<(StatusCode, Json<AutoSpliceResult>), ApiError> {
    let result = state.store.auto_splice(id, &req).await?;
    Ok(created(result))
}
