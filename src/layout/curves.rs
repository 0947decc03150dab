use std::collections::{BTreeMap, HashMap};

use crate::models::{EdgeCurve, EdgeShape, LayoutEdge, Position};

/// Perpendicular offset step between neighbouring parallel curves
pub const CURVE_STEP: f64 = 0.15;
/// Endpoints closer than this are drawn as a loop
pub const COLOCATION_EPSILON: f64 = 0.005;

/// Control point of a quadratic curve from `start` to `end`: the midpoint
/// pushed along the left-hand normal by `offset` times the segment length.
pub fn curve_control_point(start: Position, end: Position, offset: f64) -> Position {
    let mid = Position::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    Position::new(mid.x - dy * offset, mid.y + dx * offset)
}

fn is_loop(edge: &LayoutEdge, positions: &BTreeMap<i64, Position>) -> bool {
    if edge.source_id == edge.target_id {
        return true;
    }
    match (positions.get(&edge.source_id), positions.get(&edge.target_id)) {
        (Some(a), Some(b)) => a.distance_to(b) < COLOCATION_EPSILON,
        _ => false,
    }
}

/// Assign a drawing shape to every edge.
///
/// Edges sharing an unordered node pair get symmetric offsets
/// `(i - (k-1)/2) * CURVE_STEP` (ordered by edge id), measured against the
/// lower-id -> higher-id direction so reversed edges still fan apart. A lone
/// edge, or the middle one of an odd bundle, is straight. Self-loops and
/// edges between coincident nodes get a per-node loop index instead.
pub fn compute_edge_curves(edges: &[LayoutEdge], positions: &BTreeMap<i64, Position>) -> Vec<EdgeCurve> {
    let mut by_id: Vec<&LayoutEdge> = edges.iter().collect();
    by_id.sort_by_key(|e| e.id);

    let mut loops_at: HashMap<i64, usize> = HashMap::new();
    let mut bundles: BTreeMap<(i64, i64), Vec<&LayoutEdge>> = BTreeMap::new();
    let mut shapes: HashMap<i64, EdgeShape> = HashMap::new();

    for edge in by_id {
        if is_loop(edge, positions) {
            let anchor = edge.source_id.min(edge.target_id);
            let counter = loops_at.entry(anchor).or_insert(0);
            shapes.insert(edge.id, EdgeShape::Loop { loop_index: *counter });
            *counter += 1;
        } else {
            let key = (edge.source_id.min(edge.target_id), edge.source_id.max(edge.target_id));
            bundles.entry(key).or_default().push(edge);
        }
    }

    for bundle in bundles.values() {
        let centre = (bundle.len() as f64 - 1.0) / 2.0;
        for (i, edge) in bundle.iter().enumerate() {
            let canonical = (i as f64 - centre) * CURVE_STEP;
            if canonical == 0.0 {
                shapes.insert(edge.id, EdgeShape::Straight);
                continue;
            }
            let offset = if edge.source_id <= edge.target_id { canonical } else { -canonical };
            let control = match (positions.get(&edge.source_id), positions.get(&edge.target_id)) {
                (Some(&a), Some(&b)) => Some(curve_control_point(a, b, offset)),
                _ => None,
            };
            shapes.insert(edge.id, EdgeShape::Curved { offset, control });
        }
    }

    edges
        .iter()
        .map(|e| EdgeCurve {
            edge_id: e.id,
            shape: shapes.get(&e.id).copied().unwrap_or(EdgeShape::Straight),
        })
        .collect()
}
