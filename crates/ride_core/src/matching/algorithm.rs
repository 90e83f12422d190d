use crate::model::{Captain, RideClass};

/// Strategy for picking one captain out of a candidate pool.
///
/// Selectors only choose; claiming the captain is the policy's job, so a
/// selector never has to reason about concurrent bookings.
pub trait CaptainSelector: Send + Sync + std::fmt::Debug {
    /// Index into `candidates` of the captain to offer the ride to.
    ///
    /// `candidates` are approved, available and of the requested class.
    /// Returns `None` to decline every candidate.
    fn select(&self, class: RideClass, pickup: &str, candidates: &[Captain]) -> Option<usize>;
}
