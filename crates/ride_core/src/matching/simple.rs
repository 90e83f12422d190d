use crate::model::{Captain, RideClass};

use super::algorithm::CaptainSelector;

/// First candidate in ledger order. Deterministic; useful as a baseline and
/// in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl CaptainSelector for FirstAvailable {
    fn select(&self, _class: RideClass, _pickup: &str, candidates: &[Captain]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}
