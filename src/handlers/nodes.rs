use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError};

/// List all nodes
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Node>>, ApiError> {
    let nodes = state.store.list_nodes().await?;
    Ok(Json(nodes))
}

/// Get a single node by ID
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Node>, ApiError> {
    let node = state
        .store
        .get_node(id)
        .await?
        .ok_or_else(|| ApiError::not_found("node"))?;
    Ok(Json(node))
}

/// Create a new node
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(axum::http::StatusCode, Json<Node>), ApiError> {
    let node = state.store.create_node(&req).await?;
    tracing::info!(node_id = node.id, "Created node {}", node.name);
    Ok(created(node))
}
