use std::collections::BTreeMap;

use crate::models::{Layout, LayoutEdge, LayoutNode, Position};

use super::{by_ring_order, direction, finish, point_on_circle, ring_order, CENTER, RING_RADIUS, SPUR_LENGTH};

/// Spurs fan across this arc, centred on the hub's outward direction (±45°)
const SPUR_FAN: f64 = std::f64::consts::FRAC_PI_2;

fn is_backbone(node: &LayoutNode) -> bool {
    let order = ring_order(node);
    (order - order.round()).abs() < 0.01
}

/// Lay out a ring diagram.
///
/// Nodes with an integer `order_in_ring` form the backbone circle; nodes with
/// a fractional order are spurs hung off backbone node `floor(order)`. A spur
/// whose backbone node is missing joins the backbone itself. Placement is
/// driven by ring order alone, so edges don't move nodes.
pub fn compute_ring_layout(nodes: &[LayoutNode], _edges: &[LayoutEdge]) -> Layout {
    let mut sorted: Vec<&LayoutNode> = nodes.iter().collect();
    sorted.sort_by(by_ring_order);

    let (mut backbone, spurs): (Vec<&LayoutNode>, Vec<&LayoutNode>) =
        sorted.into_iter().partition(|n| is_backbone(n));

    let parent_of = |spur: &LayoutNode, backbone: &[&LayoutNode]| -> Option<i64> {
        let parent_order = ring_order(spur).floor();
        backbone
            .iter()
            .find(|b| ring_order(b).round() == parent_order)
            .map(|b| b.id)
    };

    let mut spurs_by_parent: BTreeMap<i64, Vec<&LayoutNode>> = BTreeMap::new();
    let mut orphans = Vec::new();
    for spur in spurs {
        match parent_of(spur, &backbone) {
            Some(parent) => spurs_by_parent.entry(parent).or_default().push(spur),
            None => orphans.push(spur),
        }
    }
    backbone.extend(orphans);

    let mut positions = BTreeMap::new();
    for (index, node) in backbone.iter().enumerate() {
        positions.insert(node.id, point_on_circle(CENTER, RING_RADIUS, index, backbone.len()));
    }

    for (parent_id, children) in &spurs_by_parent {
        let Some(&parent) = positions.get(parent_id) else {
            continue;
        };
        let (dir_x, dir_y) = direction(CENTER, parent);
        let count = children.len();

        for (idx, child) in children.iter().enumerate() {
            let rotation = if count > 1 {
                -SPUR_FAN / 2.0 + idx as f64 * (SPUR_FAN / (count - 1) as f64)
            } else {
                0.0
            };
            let (sin, cos) = rotation.sin_cos();
            let rx = dir_x * cos - dir_y * sin;
            let ry = dir_x * sin + dir_y * cos;
            positions.insert(
                child.id,
                Position::new(parent.x + rx * SPUR_LENGTH, parent.y + ry * SPUR_LENGTH),
            );
        }
    }

    finish(positions)
}
