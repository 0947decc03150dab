use std::collections::{HashMap, HashSet};

use crate::error::TopologyError;
use crate::models::{FiberRef, FiberTrace, Splice, SpliceType, TraceHop, TraceTerminus};

use super::SpliceIndex;

/// One direction of a walk away from the starting fiber.
struct Leg<'a> {
    /// (splice crossed, fiber reached) in walking order
    steps: Vec<(&'a Splice, FiberRef)>,
    terminus: TraceTerminus,
}

/// Order in which the splices on the starting fiber are walked: the
/// downstream pass-through first, so the result reads in signal direction.
fn head_rank(start: FiberRef, splice: &Splice) -> (u8, i64) {
    let rank = match splice.splice_type {
        SpliceType::PassThrough if splice.incoming == start => 0,
        SpliceType::Termination => 1,
        SpliceType::PassThrough => 2,
    };
    (rank, splice.id)
}

fn walk<'a>(
    index: &'a SpliceIndex,
    start: FiberRef,
    head: &'a Splice,
    visited: &mut HashSet<FiberRef>,
) -> Result<Leg<'a>, TopologyError> {
    let mut steps = Vec::new();
    let mut current = start;
    let mut via = head;

    loop {
        let peer = match via.splice_type {
            SpliceType::Termination => {
                return Ok(Leg {
                    steps,
                    terminus: TraceTerminus::Terminated {
                        jc_id: via.jc_id,
                        splice_id: via.id,
                    },
                });
            }
            SpliceType::PassThrough => match via.peer_of(current) {
                Some(peer) => peer,
                None => return Ok(Leg { steps, terminus: TraceTerminus::Open }),
            },
        };

        if !visited.insert(peer) {
            tracing::warn!("Splice cycle detected while tracing {}: revisited {}", start, peer);
            return Err(TopologyError::CycleDetected(peer));
        }
        steps.push((via, peer));

        // Continue through the splice at the peer's other end
        match index.splices_for(peer).find(|s| s.id != via.id) {
            Some(next) => {
                current = peer;
                via = next;
            }
            None => return Ok(Leg { steps, terminus: TraceTerminus::Open }),
        }
    }
}

/// Walk the splice graph outward from `start` in both directions and return
/// the continuous physical route from one end to the other.
///
/// Every step visits a fiber not seen before, so the walk ends after at most
/// as many steps as there are splices; revisiting a fiber means the splice records form a
/// loop and is reported as `CycleDetected`.
pub fn trace_fiber(start: FiberRef, index: &SpliceIndex) -> Result<FiberTrace, TopologyError> {
    let mut heads: Vec<&Splice> = index.splices_for(start).collect();
    heads.sort_by_key(|s| head_rank(start, s));

    let mut visited = HashSet::from([start]);
    let forward = match heads.first() {
        Some(head) => walk(index, start, head, &mut visited)?,
        None => Leg { steps: Vec::new(), terminus: TraceTerminus::Open },
    };
    let backward = match heads.get(1) {
        Some(head) => walk(index, start, head, &mut visited)?,
        None => Leg { steps: Vec::new(), terminus: TraceTerminus::Open },
    };

    let mut hops = Vec::with_capacity(forward.steps.len() + backward.steps.len() + 1);

    // Backward leg, far end first; each hop links to the one nearer the start
    for (splice, fiber) in backward.steps.iter().rev() {
        hops.push(TraceHop {
            cable_id: fiber.cable_id,
            fiber_no: fiber.fiber_no,
            jc_id: Some(splice.jc_id),
            splice_id: Some(splice.id),
        });
    }

    let first_forward = forward.steps.first().map(|(s, _)| *s);
    hops.push(TraceHop {
        cable_id: start.cable_id,
        fiber_no: start.fiber_no,
        jc_id: first_forward.map(|s| s.jc_id),
        splice_id: first_forward.map(|s| s.id),
    });

    for (i, (_, fiber)) in forward.steps.iter().enumerate() {
        let next = forward.steps.get(i + 1).map(|(s, _)| *s);
        hops.push(TraceHop {
            cable_id: fiber.cable_id,
            fiber_no: fiber.fiber_no,
            jc_id: next.map(|s| s.jc_id),
            splice_id: next.map(|s| s.id),
        });
    }

    let used = forward
        .steps
        .iter()
        .chain(backward.steps.iter())
        .map(|(s, _)| *s)
        .chain(terminal_splice(index, &forward.terminus))
        .chain(terminal_splice(index, &backward.terminus));
    let total_loss_db = used.filter_map(|s| s.loss_db).sum();

    tracing::debug!("Traced {}: {} hops", start, hops.len());

    Ok(FiberTrace {
        hops,
        start: backward.terminus,
        end: forward.terminus,
        total_length_km: None,
        total_loss_db,
    })
}

fn terminal_splice<'a>(index: &'a SpliceIndex, terminus: &TraceTerminus) -> Option<&'a Splice> {
    match terminus {
        TraceTerminus::Terminated { splice_id, .. } => {
            index.splices.iter().find(|s| s.id == *splice_id)
        }
        TraceTerminus::Open => None,
    }
}

/// Fill in the route length once every cable on it has a known length.
pub fn apply_cable_lengths(trace: &mut FiberTrace, lengths: &HashMap<i64, f64>) {
    trace.total_length_km = trace
        .hops
        .iter()
        .map(|hop| lengths.get(&hop.cable_id).copied())
        .sum::<Option<f64>>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::fixtures::{pass_through, termination};

    fn route(trace: &FiberTrace) -> Vec<(i64, i64)> {
        trace.hops.iter().map(|h| (h.cable_id, h.fiber_no)).collect()
    }

    #[test]
    fn test_unspliced_fiber_is_single_open_hop() {
        let index = SpliceIndex::default();
        let trace = trace_fiber(FiberRef::new(1, 1), &index).unwrap();
        assert_eq!(route(&trace), vec![(1, 1)]);
        assert_eq!(trace.start, TraceTerminus::Open);
        assert_eq!(trace.end, TraceTerminus::Open);
        assert!(trace.hops[0].jc_id.is_none());
    }

    #[test]
    fn test_trace_through_chain_from_the_middle() {
        // T@10 | A.1 | JC11 | B.3 | JC12 | C.3 | T@13
        let index = SpliceIndex::new(vec![
            termination(1, 10, (1, 1)),
            pass_through(2, 11, (1, 1), (2, 3)),
            pass_through(3, 12, (2, 3), (3, 3)),
            termination(4, 13, (3, 3)),
        ]);

        let trace = trace_fiber(FiberRef::new(2, 3), &index).unwrap();
        assert_eq!(route(&trace), vec![(1, 1), (2, 3), (3, 3)]);
        assert_eq!(trace.hops[0].jc_id, Some(11));
        assert_eq!(trace.hops[1].jc_id, Some(12));
        assert_eq!(trace.hops[2].jc_id, None);
        assert_eq!(trace.start, TraceTerminus::Terminated { jc_id: 10, splice_id: 1 });
        assert_eq!(trace.end, TraceTerminus::Terminated { jc_id: 13, splice_id: 4 });
    }

    #[test]
    fn test_trace_is_same_route_from_either_end() {
        let index = SpliceIndex::new(vec![
            pass_through(1, 11, (1, 1), (2, 3)),
            pass_through(2, 12, (2, 3), (3, 3)),
        ]);
        let from_a = trace_fiber(FiberRef::new(1, 1), &index).unwrap();
        let from_c = trace_fiber(FiberRef::new(3, 3), &index).unwrap();

        let mut reversed = route(&from_c);
        reversed.reverse();
        assert_eq!(route(&from_a), reversed);
        assert_eq!(from_a.end, TraceTerminus::Open);
    }

    #[test]
    fn test_pass_through_walked_against_direction() {
        // Start on the outgoing side: the splice is still crossed
        let index = SpliceIndex::new(vec![pass_through(1, 11, (1, 1), (2, 1))]);
        let trace = trace_fiber(FiberRef::new(2, 1), &index).unwrap();
        assert_eq!(route(&trace), vec![(2, 1), (1, 1)]);
    }

    #[test]
    fn test_cycle_is_reported() {
        // A.1 -> B.1 at one closure, B.1 -> A.1 at another
        let index = SpliceIndex::new(vec![
            pass_through(1, 11, (1, 1), (2, 1)),
            pass_through(2, 12, (2, 1), (1, 1)),
        ]);
        let err = trace_fiber(FiberRef::new(1, 1), &index).unwrap_err();
        assert!(matches!(err, TopologyError::CycleDetected(_)));
    }

    #[test]
    fn test_hops_bounded_by_splice_count() {
        let mut splices = Vec::new();
        for c in 1..50 {
            splices.push(pass_through(c, 100 + c, (c, 1), (c + 1, 1)));
        }
        let index = SpliceIndex::new(splices);
        let trace = trace_fiber(FiberRef::new(25, 1), &index).unwrap();
        assert_eq!(trace.hops.len(), 50);
        assert!(trace.hops.len() <= index.splices.len() + 1);
    }

    #[test]
    fn test_loss_and_length_totals() {
        let mut a = pass_through(1, 11, (1, 1), (2, 1));
        a.loss_db = Some(0.1);
        let mut t = termination(2, 12, (2, 1));
        t.loss_db = Some(0.05);
        let index = SpliceIndex::new(vec![a, t]);

        let mut trace = trace_fiber(FiberRef::new(1, 1), &index).unwrap();
        assert!((trace.total_loss_db - 0.15).abs() < 1e-9);

        let lengths = HashMap::from([(1, 2.5)]);
        apply_cable_lengths(&mut trace, &lengths);
        assert_eq!(trace.total_length_km, None);

        let lengths = HashMap::from([(1, 2.5), (2, 1.0)]);
        apply_cable_lengths(&mut trace, &lengths);
        assert_eq!(trace.total_length_km, Some(3.5));
    }
}
