use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position in diagram coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// A node to be placed by the layout engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: i64,
    #[serde(default)]
    pub order_in_ring: Option<f64>,
    #[serde(default)]
    pub is_hub: bool,
}

/// A connection between two layout nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

/// Layout is the result of a ring or mesh layout computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub positions: BTreeMap<i64, Position>,
    /// Offset from each node position to its label anchor, pointing away from the centre
    pub label_offsets: BTreeMap<i64, Position>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutRequest {
    pub nodes: Vec<LayoutNode>,
    #[serde(default)]
    pub edges: Vec<LayoutEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeCurveRequest {
    pub edges: Vec<LayoutEdge>,
    pub positions: BTreeMap<i64, Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EdgeShape {
    Straight,
    /// Quadratic curve; `offset` is the signed perpendicular factor relative to source->target
    Curved {
        offset: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        control: Option<Position>,
    },
    /// Self-loop drawn at the node; higher indices are drawn larger
    Loop { loop_index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeCurve {
    pub edge_id: i64,
    #[serde(flatten)]
    pub shape: EdgeShape,
}
