use std::sync::Arc;

use tracing::debug;

use crate::config::MatchingConfig;
use crate::error::Result;
use crate::ledger::CaptainLedger;
use crate::model::{Captain, RideClass};

use super::algorithm::CaptainSelector;

/// Re-queries of the ledger after every candidate in a pool was lost to a
/// concurrent booking.
const MAX_POOL_ROUNDS: usize = 5;

/// Picks a captain and claims them in one step.
///
/// The selector chooses from a snapshot of the pool; the choice only counts
/// once the ledger's compare-and-swap flips the captain to busy. A lost claim
/// drops that candidate and the selector chooses again.
#[derive(Debug)]
pub struct MatchingPolicy {
    ledger: Arc<dyn CaptainLedger>,
    selector: Box<dyn CaptainSelector>,
    config: MatchingConfig,
}

impl MatchingPolicy {
    pub fn new(
        ledger: Arc<dyn CaptainLedger>,
        selector: Box<dyn CaptainSelector>,
        config: MatchingConfig,
    ) -> Self {
        Self { ledger, selector, config }
    }

    /// Claimed captain for `class`, or `None` when the pool is exhausted.
    ///
    /// The returned captain is already assigned to `ride_code` with the ride
    /// counted.
    pub fn find_captain(
        &self,
        class: RideClass,
        pickup: &str,
        ride_code: &str,
    ) -> Result<Option<Captain>> {
        let limit = self.config.candidate_limit.max(1);

        for round in 0..MAX_POOL_ROUNDS {
            let mut candidates = self.ledger.find_candidates(class, limit)?;
            if candidates.is_empty() {
                debug!(%class, round, "no candidates left");
                return Ok(None);
            }

            while let Some(index) = self.selector.select(class, pickup, &candidates) {
                if index >= candidates.len() {
                    break;
                }
                let chosen = candidates.remove(index);
                if let Some(claimed) = self.ledger.try_claim(&chosen.id, ride_code)? {
                    debug!(%class, captain_id = %claimed.id, round, "captain claimed");
                    return Ok(Some(claimed));
                }
                debug!(%class, captain_id = %chosen.id, "claim lost to a concurrent booking");
            }

            if !candidates.is_empty() {
                // The selector declined the remaining candidates.
                return Ok(None);
            }
        }

        Ok(None)
    }
}
