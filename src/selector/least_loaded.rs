//! Least-loaded selection strategy.

use crate::registry::resource::Resource;
use crate::selector::{tie_break, SelectionStrategy};

/// Selects the resource with the minimum `capacity_load`.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for LeastLoaded {
    fn choose<'a>(&self, candidates: &'a [Resource]) -> Option<&'a Resource> {
        candidates
            .iter()
            .min_by(|a, b| a.capacity_load.cmp(&b.capacity_load).then_with(|| tie_break(a, b)))
    }
}
