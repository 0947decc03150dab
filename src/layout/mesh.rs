use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{Layout, LayoutEdge, LayoutNode};

use super::{by_ring_order, finish, point_on_circle, polar, CENTER, RING_RADIUS, SPOKE_RADIUS};

/// Lay out a hub-and-spoke mesh diagram.
///
/// Hub-flagged nodes go evenly round the main circle. A non-hub node with a
/// direct edge to a hub is a spoke of the first such hub (in hub order) and
/// is placed on a small circle round it, the first spoke pointing away from
/// the centre. Unattached nodes sit on an outer circle. With no hubs at all,
/// every node is treated as a hub.
pub fn compute_mesh_layout(nodes: &[LayoutNode], edges: &[LayoutEdge]) -> Layout {
    let mut sorted: Vec<&LayoutNode> = nodes.iter().collect();
    sorted.sort_by(by_ring_order);

    let any_hub = sorted.iter().any(|n| n.is_hub);
    let (hubs, others): (Vec<&LayoutNode>, Vec<&LayoutNode>) =
        sorted.into_iter().partition(|n| n.is_hub || !any_hub);

    let mut neighbours: HashMap<i64, HashSet<i64>> = HashMap::new();
    for edge in edges {
        neighbours.entry(edge.source_id).or_default().insert(edge.target_id);
        neighbours.entry(edge.target_id).or_default().insert(edge.source_id);
    }

    let mut spokes: BTreeMap<usize, Vec<&LayoutNode>> = BTreeMap::new();
    let mut unattached = Vec::new();
    for node in others {
        let hub_index = neighbours
            .get(&node.id)
            .and_then(|adjacent| hubs.iter().position(|h| adjacent.contains(&h.id)));
        match hub_index {
            Some(idx) => spokes.entry(idx).or_default().push(node),
            None => unattached.push(node),
        }
    }

    let mut positions = BTreeMap::new();
    for (index, hub) in hubs.iter().enumerate() {
        let hub_pos = point_on_circle(CENTER, RING_RADIUS, index, hubs.len());
        positions.insert(hub.id, hub_pos);

        if let Some(children) = spokes.get(&index) {
            let outward = (hub_pos.y - CENTER.y).atan2(hub_pos.x - CENTER.x);
            let step = std::f64::consts::TAU / children.len() as f64;
            for (j, child) in children.iter().enumerate() {
                positions.insert(child.id, polar(hub_pos, SPOKE_RADIUS, outward + j as f64 * step));
            }
        }
    }

    let outer_radius = RING_RADIUS + 2.0 * SPOKE_RADIUS;
    for (index, node) in unattached.iter().enumerate() {
        positions.insert(node.id, point_on_circle(CENTER, outer_radius, index, unattached.len()));
    }

    finish(positions)
}
