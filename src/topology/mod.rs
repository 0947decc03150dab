//! Pure fiber-topology algorithms. Nothing in here touches the database:
//! callers load splices and segments, these functions classify and walk them.

pub mod status;
pub mod trace;
pub mod validation;

use std::collections::HashMap;

use crate::models::{FiberRef, Splice};

/// SpliceIndex is an arena of splices with a lookup keyed by fiber.
///
/// The physical splice graph is never linked by reference: a walk moves from
/// fiber to fiber through this map, so removing a splice cannot leave a
/// dangling edge behind.
#[derive(Debug, Default)]
pub struct SpliceIndex {
    splices: Vec<Splice>,
    by_fiber: HashMap<FiberRef, Vec<usize>>,
}

impl SpliceIndex {
    pub fn new(mut splices: Vec<Splice>) -> Self {
        splices.sort_by_key(|s| s.id);
        let mut by_fiber: HashMap<FiberRef, Vec<usize>> = HashMap::new();
        for (idx, splice) in splices.iter().enumerate() {
            for fiber in splice.endpoints() {
                by_fiber.entry(fiber).or_default().push(idx);
            }
        }
        Self { splices, by_fiber }
    }

    /// Splices touching `fiber`, in ascending id order
    pub fn splices_for(&self, fiber: FiberRef) -> impl Iterator<Item = &Splice> + '_ {
        self.by_fiber
            .get(&fiber)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.splices[idx])
    }

    /// The splice holding `fiber`'s end inside closure `jc_id`, if any
    pub fn splice_at(&self, jc_id: i64, fiber: FiberRef) -> Option<&Splice> {
        self.splices_for(fiber).find(|s| s.jc_id == jc_id)
    }

    pub fn splice_count(&self, fiber: FiberRef) -> usize {
        self.by_fiber.get(&fiber).map_or(0, Vec::len)
    }
}
