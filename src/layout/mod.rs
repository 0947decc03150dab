//! Deterministic diagram geometry for ring and mesh views.
//!
//! Every function here is a pure function of its inputs; nothing is cached or
//! persisted and there is no randomness, so equal inputs give equal layouts.

mod curves;
mod mesh;
mod ring;

pub use curves::compute_edge_curves;
pub use mesh::compute_mesh_layout;
pub use ring::compute_ring_layout;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Bounds, Layout, LayoutNode, Position};

pub const CENTER: Position = Position { x: 1000.0, y: 1000.0 };
pub const RING_RADIUS: f64 = 400.0;
pub const SPUR_LENGTH: f64 = 200.0;
pub const SPOKE_RADIUS: f64 = 150.0;
pub const LABEL_OFFSET: f64 = 24.0;
pub const BOUNDS_PADDING: f64 = 100.0;

/// Angle of the first node on a circle: straight up
const START_ANGLE: f64 = -std::f64::consts::FRAC_PI_2;

fn ring_order(node: &LayoutNode) -> f64 {
    node.order_in_ring.unwrap_or(0.0)
}

/// Stable node ordering: ring order, then id
fn by_ring_order(a: &&LayoutNode, b: &&LayoutNode) -> Ordering {
    ring_order(a)
        .total_cmp(&ring_order(b))
        .then_with(|| a.id.cmp(&b.id))
}

/// Point `index` of `count` spaced evenly on a circle, starting at the top
fn point_on_circle(center: Position, radius: f64, index: usize, count: usize) -> Position {
    let step = std::f64::consts::TAU / count.max(1) as f64;
    let angle = START_ANGLE + index as f64 * step;
    polar(center, radius, angle)
}

fn polar(center: Position, radius: f64, angle: f64) -> Position {
    Position::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Unit vector from `from` towards `to`; straight right when they coincide
fn direction(from: Position, to: Position) -> (f64, f64) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let mag = dx.hypot(dy);
    if mag == 0.0 {
        (1.0, 0.0)
    } else {
        (dx / mag, dy / mag)
    }
}

/// Wrap computed positions with radial label offsets and a padded bounding box.
fn finish(positions: BTreeMap<i64, Position>) -> Layout {
    let label_offsets = positions
        .iter()
        .map(|(&id, &pos)| {
            let offset = if pos.distance_to(&CENTER) == 0.0 {
                Position::new(0.0, -LABEL_OFFSET)
            } else {
                let (dx, dy) = direction(CENTER, pos);
                Position::new(dx * LABEL_OFFSET, dy * LABEL_OFFSET)
            };
            (id, offset)
        })
        .collect();

    let bounds = if positions.is_empty() {
        Bounds {
            min: Position::new(CENTER.x - BOUNDS_PADDING, CENTER.y - BOUNDS_PADDING),
            max: Position::new(CENTER.x + BOUNDS_PADDING, CENTER.y + BOUNDS_PADDING),
        }
    } else {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in positions.values() {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Bounds {
            min: Position::new(min_x - BOUNDS_PADDING, min_y - BOUNDS_PADDING),
            max: Position::new(max_x + BOUNDS_PADDING, max_y + BOUNDS_PADDING),
        }
    };

    Layout { positions, label_offsets, bounds }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_point_is_top_of_circle() {
        let p = point_on_circle(CENTER, 100.0, 0, 4);
        assert!((p.x - 1000.0).abs() < 1e-9);
        assert!((p.y - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_layout_has_default_bounds() {
        let layout = finish(BTreeMap::new());
        assert!(layout.positions.is_empty());
        assert!(layout.label_offsets.is_empty());
        assert_eq!(layout.bounds.min, Position::new(900.0, 900.0));
        assert_eq!(layout.bounds.max, Position::new(1100.0, 1100.0));
    }

    #[test]
    fn test_label_offset_points_outward() {
        let positions = BTreeMap::from([(1, Position::new(1400.0, 1000.0))]);
        let layout = finish(positions);
        assert_eq!(layout.label_offsets[&1], Position::new(LABEL_OFFSET, 0.0));
        assert_eq!(layout.bounds.max, Position::new(1500.0, 1100.0));
    }
}
