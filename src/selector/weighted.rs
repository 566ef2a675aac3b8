//! Weighted least-loaded selection strategy.
//!
//! Ranks by load per unit of declared weight, so a resource declared twice as
//! large is preferred until it carries twice the load.

use std::cmp::Ordering;

use crate::registry::resource::Resource;
use crate::selector::{tie_break, SelectionStrategy};

#[derive(Debug, Default)]
pub struct WeightedLeastLoaded;

impl WeightedLeastLoaded {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compare `load_a / weight_a` with `load_b / weight_b` without division.
fn effective_load_cmp(a: &Resource, b: &Resource) -> Ordering {
    let lhs = a.capacity_load as u64 * b.weight.max(1) as u64;
    let rhs = b.capacity_load as u64 * a.weight.max(1) as u64;
    lhs.cmp(&rhs)
}

impl SelectionStrategy for WeightedLeastLoaded {
    fn choose<'a>(&self, candidates: &'a [Resource]) -> Option<&'a Resource> {
        candidates
            .iter()
            .min_by(|a, b| effective_load_cmp(a, b).then_with(|| tie_break(a, b)))
    }
}
