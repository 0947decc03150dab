use axum::Json;

use crate::layout::{compute_edge_curves, compute_mesh_layout, compute_ring_layout};
use crate::models::*;

use super::ApiError;

fn check_finite(nodes: &[LayoutNode]) -> Result<(), ApiError> {
    match nodes.iter().find(|n| n.order_in_ring.is_some_and(|o| !o.is_finite())) {
        Some(node) => Err(ApiError::bad_request(format!(
            "node {} has a non-finite order_in_ring",
            node.id
        ))),
        None => Ok(()),
    }
}

/// Ring layout: backbone on a circle, spurs fanned outward
pub async fn ring_layout(Json(req): Json<LayoutRequest>) -> Result<Json<Layout>, ApiError> {
    check_finite(&req.nodes)?;
    Ok(Json(compute_ring_layout(&req.nodes, &req.edges)))
}

/// Mesh layout: hubs on a circle, spokes around their hub
pub async fn mesh_layout(Json(req): Json<LayoutRequest>) -> Result<Json<Layout>, ApiError> {
    check_finite(&req.nodes)?;
    Ok(Json(compute_mesh_layout(&req.nodes, &req.edges)))
}

/// Curve offsets for parallel edges and loops
pub async fn edge_curves(Json(req): Json<EdgeCurveRequest>) -> Json<Vec<EdgeCurve>> {
    Json(compute_edge_curves(&req.edges, &req.positions))
}
