use std::sync::Arc;

use crate::model::{Captain, RideClass};
use crate::random::RandomSource;

use super::algorithm::CaptainSelector;

/// Uniform choice over the candidate pool.
///
/// Stands in for proximity ranking while captain positions are unknown; a
/// nearest-neighbour selector can replace it without touching the policy.
#[derive(Debug, Clone)]
pub struct RandomSelection {
    rng: Arc<dyn RandomSource>,
}

impl RandomSelection {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }
}

impl CaptainSelector for RandomSelection {
    fn select(&self, _class: RideClass, _pickup: &str, candidates: &[Captain]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(self.rng.pick_index(candidates.len()))
    }
}
