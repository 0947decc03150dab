use std::collections::BTreeSet;

use crate::models::{Cable, FiberRef, FiberStatus, FiberStatusView, Splice, SpliceType};

use super::SpliceIndex;

/// Status a single splice gives to `fiber`, or None if the splice doesn't touch it.
pub fn status_from_splice(fiber: FiberRef, splice: &Splice) -> Option<FiberStatusView> {
    let (status, peer) = match splice.splice_type {
        SpliceType::Termination if splice.incoming == fiber => (FiberStatus::Terminated, None),
        SpliceType::PassThrough if splice.incoming == fiber => {
            (FiberStatus::UsedAsIncoming, splice.outgoing)
        }
        SpliceType::PassThrough if splice.outgoing == Some(fiber) => {
            (FiberStatus::UsedAsOutgoing, Some(splice.incoming))
        }
        _ => return None,
    };
    Some(FiberStatusView {
        cable_id: fiber.cable_id,
        fiber_no: fiber.fiber_no,
        status,
        peer,
        splice_id: Some(splice.id),
        jc_id: Some(splice.jc_id),
    })
}

fn available(fiber: FiberRef) -> FiberStatusView {
    FiberStatusView {
        cable_id: fiber.cable_id,
        fiber_no: fiber.fiber_no,
        status: FiberStatus::Available,
        peer: None,
        splice_id: None,
        jc_id: None,
    }
}

fn precedence(status: FiberStatus) -> u8 {
    match status {
        FiberStatus::Terminated => 0,
        FiberStatus::UsedAsIncoming => 1,
        FiberStatus::UsedAsOutgoing => 2,
        FiberStatus::Available => 3,
    }
}

/// Resolve a fiber's overall status from the splices of its cable.
///
/// A fiber can be spliced at both of its ends; when it is, the reported
/// status is the strongest of the two (terminated, then incoming, then
/// outgoing), ties going to the older splice.
pub fn resolve_status<'a, I>(fiber: FiberRef, splices: I) -> FiberStatusView
where
    I: IntoIterator<Item = &'a Splice>,
{
    splices
        .into_iter()
        .filter_map(|s| status_from_splice(fiber, s))
        .min_by_key(|v| (precedence(v.status), v.splice_id))
        .unwrap_or_else(|| available(fiber))
}

/// Resolve the status of `fiber`'s end inside one junction closure.
pub fn resolve_status_at<'a, I>(jc_id: i64, fiber: FiberRef, splices: I) -> FiberStatusView
where
    I: IntoIterator<Item = &'a Splice>,
{
    resolve_status(fiber, splices.into_iter().filter(|s| s.jc_id == jc_id))
}

/// Fiber numbers of `cable` with no splice at either end.
pub fn available_fibers(cable: &Cable, index: &SpliceIndex) -> BTreeSet<i64> {
    (1..=cable.capacity)
        .filter(|&n| index.splice_count(FiberRef::new(cable.id, n)) == 0)
        .collect()
}

/// Fiber numbers present in every set. No sets means no candidates.
pub fn intersect_available(sets: &[BTreeSet<i64>]) -> BTreeSet<i64> {
    let Some((first, rest)) = sets.split_first() else {
        return BTreeSet::new();
    };
    rest.iter().fold(first.clone(), |acc, set| {
        acc.intersection(set).copied().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::fixtures::{pass_through, termination};
    use chrono::Utc;

    fn cable(id: i64, capacity: i64) -> Cable {
        Cable {
            id,
            route_name: format!("C{}", id),
            capacity,
            start_node_id: 1,
            end_node_id: 2,
            length_km: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unspliced_fiber_is_available() {
        let view = resolve_status(FiberRef::new(1, 4), &Vec::<Splice>::new());
        assert_eq!(view.status, FiberStatus::Available);
        assert!(view.peer.is_none());
        assert!(view.splice_id.is_none());
    }

    #[test]
    fn test_pass_through_sides() {
        let splices = vec![pass_through(7, 3, (1, 4), (2, 9))];

        let incoming = resolve_status(FiberRef::new(1, 4), &splices);
        assert_eq!(incoming.status, FiberStatus::UsedAsIncoming);
        assert_eq!(incoming.peer, Some(FiberRef::new(2, 9)));
        assert_eq!(incoming.splice_id, Some(7));
        assert_eq!(incoming.jc_id, Some(3));

        let outgoing = resolve_status(FiberRef::new(2, 9), &splices);
        assert_eq!(outgoing.status, FiberStatus::UsedAsOutgoing);
        assert_eq!(outgoing.peer, Some(FiberRef::new(1, 4)));

        // Same fiber number on another cable is untouched
        assert_eq!(resolve_status(FiberRef::new(2, 4), &splices).status, FiberStatus::Available);
    }

    #[test]
    fn test_termination_has_no_peer() {
        let splices = vec![termination(1, 3, (1, 2))];
        let view = resolve_status(FiberRef::new(1, 2), &splices);
        assert_eq!(view.status, FiberStatus::Terminated);
        assert!(view.peer.is_none());
    }

    #[test]
    fn test_both_ends_spliced_reports_strongest() {
        let splices = vec![
            pass_through(1, 3, (5, 1), (1, 1)),
            termination(2, 4, (1, 1)),
        ];
        assert_eq!(resolve_status(FiberRef::new(1, 1), &splices).status, FiberStatus::Terminated);

        let at_jc3 = resolve_status_at(3, FiberRef::new(1, 1), &splices);
        assert_eq!(at_jc3.status, FiberStatus::UsedAsOutgoing);
        assert_eq!(at_jc3.peer, Some(FiberRef::new(5, 1)));

        let at_jc9 = resolve_status_at(9, FiberRef::new(1, 1), &splices);
        assert_eq!(at_jc9.status, FiberStatus::Available);
    }

    #[test]
    fn test_available_fibers_excludes_either_end() {
        let index = SpliceIndex::new(vec![
            pass_through(1, 3, (1, 1), (2, 1)),
            termination(2, 4, (1, 3)),
        ]);
        let set = available_fibers(&cable(1, 4), &index);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn test_intersection_across_segments() {
        let sets = vec![
            BTreeSet::from([1, 2, 3, 5]),
            BTreeSet::from([2, 3, 4]),
            BTreeSet::from([1, 2, 3]),
        ];
        assert_eq!(intersect_available(&sets), BTreeSet::from([2, 3]));
        assert!(intersect_available(&[]).is_empty());
    }
}
