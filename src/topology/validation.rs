use crate::models::{PathSegment, PathStatus, RingValidation};

/// Classify an ordered segment chain as empty, broken, a closed ring or an open path.
///
/// Segments are sorted by `path_order` before checking. Ring closure compares
/// node ids only: the same cable walked out and back still closes.
pub fn validate_segments(segments: &[PathSegment]) -> RingValidation {
    let mut ordered: Vec<&PathSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.path_order);

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return RingValidation {
            status: PathStatus::Empty,
            message: "Path has no segments".to_string(),
        };
    };

    if let Some(pair) = ordered.windows(2).find(|w| w[0].end_node_id != w[1].start_node_id) {
        return RingValidation {
            status: PathStatus::Broken,
            message: format!(
                "Discontinuity between segment {} (ends at node {}) and segment {} (starts at node {})",
                pair[0].path_order, pair[0].end_node_id, pair[1].path_order, pair[1].start_node_id
            ),
        };
    }

    if last.end_node_id == first.start_node_id {
        RingValidation {
            status: PathStatus::ValidRing,
            message: format!("Closed ring of {} segment(s) back to node {}", ordered.len(), first.start_node_id),
        }
    } else {
        RingValidation {
            status: PathStatus::OpenPath,
            message: format!(
                "Open path of {} segment(s) from node {} to node {}",
                ordered.len(),
                first.start_node_id,
                last.end_node_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: i64, order: i64, start: i64, end: i64) -> PathSegment {
        PathSegment {
            id,
            logical_path_id: 1,
            ofc_cable_id: 100 + id,
            path_order: order,
            start_node_id: start,
            end_node_id: end,
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate_segments(&[]).status, PathStatus::Empty);
    }

    #[test]
    fn test_ring() {
        let segs = vec![seg(1, 1, 1, 2), seg(2, 2, 2, 3), seg(3, 3, 3, 1)];
        assert_eq!(validate_segments(&segs).status, PathStatus::ValidRing);
    }

    #[test]
    fn test_open_path() {
        let segs = vec![seg(1, 1, 1, 2), seg(2, 2, 2, 3)];
        assert_eq!(validate_segments(&segs).status, PathStatus::OpenPath);
    }

    #[test]
    fn test_broken() {
        let segs = vec![seg(1, 1, 1, 2), seg(2, 2, 5, 3), seg(3, 3, 3, 1)];
        let v = validate_segments(&segs);
        assert_eq!(v.status, PathStatus::Broken);
    }

    #[test]
    fn test_single_self_loop_is_ring() {
        assert_eq!(validate_segments(&[seg(1, 1, 4, 4)]).status, PathStatus::ValidRing);
        assert_eq!(validate_segments(&[seg(1, 1, 4, 5)]).status, PathStatus::OpenPath);
    }

    #[test]
    fn test_order_field_is_authoritative() {
        // Stored out of order but continuous by path_order
        let segs = vec![seg(3, 3, 3, 1), seg(1, 1, 1, 2), seg(2, 2, 2, 3)];
        assert_eq!(validate_segments(&segs).status, PathStatus::ValidRing);
    }

    #[test]
    fn test_same_cable_out_and_back_closes() {
        let mut back = seg(2, 2, 2, 1);
        back.ofc_cable_id = 101;
        let segs = vec![seg(1, 1, 1, 2), back];
        assert_eq!(validate_segments(&segs).status, PathStatus::ValidRing);
    }
}
