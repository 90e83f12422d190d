//! Captain availability and rating bookkeeping.
//!
//! Duty, approval and the active ride are independent. A captain is
//! matchable only when approved, on duty and not assigned to a ride. The
//! active ride is set by [`CaptainLedger::try_claim`] and cleared by
//! [`CaptainLedger::finish_ride`] or [`CaptainLedger::release_claim`]. The
//! rating average and count only move through [`CaptainLedger::apply_rating`].

use dashmap::DashMap;
use tracing::debug;

use crate::error::{Result, RideError};
use crate::model::{ApprovalStatus, Captain, CaptainRating, RideClass};

pub trait CaptainLedger: Send + Sync + std::fmt::Debug {
    /// Add a captain. Ids are unique.
    fn register(&self, captain: Captain) -> Result<()>;

    fn get(&self, captain_id: &str) -> Result<Captain>;

    /// Every captain, optionally filtered by approval status, ordered by id.
    fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<Captain>>;

    /// Go on or off duty. Going on duty fails while a ride is assigned.
    fn set_available(&self, captain_id: &str, available: bool) -> Result<()>;

    fn set_status(&self, captain_id: &str, status: ApprovalStatus) -> Result<()>;

    /// Up to `limit` matchable captains for `class`, ordered by id.
    fn find_candidates(&self, class: RideClass, limit: usize) -> Result<Vec<Captain>>;

    /// Atomically assign `ride_code` to a matchable captain and count the ride.
    ///
    /// Returns `None` when the captain is no longer matchable, i.e. another
    /// booking got there first.
    fn try_claim(&self, captain_id: &str, ride_code: &str) -> Result<Option<Captain>>;

    /// Point an existing claim at a regenerated ride code.
    fn reassign_claim(&self, captain_id: &str, from: &str, to: &str) -> Result<()>;

    /// Undo a [`CaptainLedger::try_claim`] whose booking could not be stored.
    fn release_claim(&self, captain_id: &str, ride_code: &str) -> Result<()>;

    /// Clear the assignment once `ride_code` is cancelled or completed.
    /// Duty status is left as it is.
    fn finish_ride(&self, captain_id: &str, ride_code: &str) -> Result<()>;

    fn apply_rating(&self, captain_id: &str, score: u8) -> Result<CaptainRating>;
}

fn unknown_captain(captain_id: &str) -> RideError {
    RideError::NotFound(format!("captain {captain_id}"))
}

/// Ledger held in a sharded concurrent map. Each mutation runs under the
/// entry's shard write lock, which makes `try_claim` a compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryCaptainLedger {
    captains: DashMap<String, Captain>,
}

impl InMemoryCaptainLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captains(captains: impl IntoIterator<Item = Captain>) -> Self {
        let ledger = Self::new();
        for captain in captains {
            ledger.captains.insert(captain.id.clone(), captain);
        }
        ledger
    }

    fn update<T>(&self, captain_id: &str, f: impl FnOnce(&mut Captain) -> T) -> Result<T> {
        let mut entry = self
            .captains
            .get_mut(captain_id)
            .ok_or_else(|| unknown_captain(captain_id))?;
        Ok(f(entry.value_mut()))
    }
}

impl CaptainLedger for InMemoryCaptainLedger {
    fn register(&self, captain: Captain) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.captains.entry(captain.id.clone()) {
            Entry::Occupied(_) => Err(RideError::Validation(format!(
                "captain {} is already registered",
                captain.id
            ))),
            Entry::Vacant(slot) => {
                debug!(captain_id = %captain.id, class = %captain.class, "registered captain");
                slot.insert(captain);
                Ok(())
            }
        }
    }

    fn get(&self, captain_id: &str) -> Result<Captain> {
        self.captains
            .get(captain_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown_captain(captain_id))
    }

    fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<Captain>> {
        let mut captains: Vec<Captain> = self
            .captains
            .iter()
            .filter(|entry| status.map_or(true, |wanted| entry.status == wanted))
            .map(|entry| entry.value().clone())
            .collect();
        captains.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(captains)
    }

    fn set_available(&self, captain_id: &str, available: bool) -> Result<()> {
        self.update(captain_id, |captain| {
            if let (true, Some(ride_code)) = (available, captain.active_ride.as_ref()) {
                return Err(RideError::CaptainBusy {
                    captain_id: captain.id.clone(),
                    ride_code: ride_code.clone(),
                });
            }
            captain.available = available;
            Ok(())
        })?
    }

    fn set_status(&self, captain_id: &str, status: ApprovalStatus) -> Result<()> {
        self.update(captain_id, |captain| captain.status = status)
    }

    fn find_candidates(&self, class: RideClass, limit: usize) -> Result<Vec<Captain>> {
        let mut candidates: Vec<Captain> = self
            .captains
            .iter()
            .filter(|entry| entry.class == class && entry.is_matchable())
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.truncate(limit);
        Ok(candidates)
    }

    fn try_claim(&self, captain_id: &str, ride_code: &str) -> Result<Option<Captain>> {
        self.update(captain_id, |captain| {
            if !captain.is_matchable() {
                return None;
            }
            captain.active_ride = Some(ride_code.to_string());
            captain.total_rides += 1;
            Some(captain.clone())
        })
    }

    fn reassign_claim(&self, captain_id: &str, from: &str, to: &str) -> Result<()> {
        self.update(captain_id, |captain| {
            if captain.active_ride.as_deref() == Some(from) {
                captain.active_ride = Some(to.to_string());
            }
        })
    }

    fn release_claim(&self, captain_id: &str, ride_code: &str) -> Result<()> {
        self.update(captain_id, |captain| {
            if captain.active_ride.as_deref() == Some(ride_code) {
                captain.active_ride = None;
                captain.total_rides = captain.total_rides.saturating_sub(1);
            }
        })
    }

    fn finish_ride(&self, captain_id: &str, ride_code: &str) -> Result<()> {
        self.update(captain_id, |captain| {
            if captain.active_ride.as_deref() == Some(ride_code) {
                captain.active_ride = None;
            } else {
                debug!(captain_id, ride_code, active = ?captain.active_ride, "ride was not assigned");
            }
        })
    }

    fn apply_rating(&self, captain_id: &str, score: u8) -> Result<CaptainRating> {
        if !(1..=5).contains(&score) {
            return Err(RideError::InvalidRating(i64::from(score)));
        }
        self.update(captain_id, |captain| {
            captain.rating.apply(score);
            captain.rating
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleDetails;

    fn captain(id: &str, class: RideClass) -> Captain {
        Captain::new(
            id,
            format!("Captain {id}"),
            "9000000000",
            class,
            VehicleDetails { number: format!("KA 01 {id}"), model: "Test".into() },
        )
        .with_status(ApprovalStatus::Approved)
    }

    #[test]
    fn candidates_filter_by_class_approval_and_availability() {
        let ledger = InMemoryCaptainLedger::with_captains([
            captain("a", RideClass::Car),
            captain("b", RideClass::Car).with_status(ApprovalStatus::Suspended),
            captain("c", RideClass::Auto),
            captain("d", RideClass::Car),
        ]);
        ledger.set_available("d", false).unwrap();

        let ids: Vec<_> = ledger
            .find_candidates(RideClass::Car, 10)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn candidates_respect_limit() {
        let ledger = InMemoryCaptainLedger::with_captains(
            (0..15).map(|i| captain(&format!("c{i:02}"), RideClass::Light)),
        );
        assert_eq!(ledger.find_candidates(RideClass::Light, 10).unwrap().len(), 10);
    }

    #[test]
    fn claim_succeeds_once() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        let claimed = ledger.try_claim("a", "QR1").unwrap().expect("first claim");
        assert_eq!(claimed.active_ride.as_deref(), Some("QR1"));
        assert!(claimed.available);
        assert_eq!(claimed.total_rides, 1);
        assert!(ledger.try_claim("a", "QR2").unwrap().is_none());

        ledger.release_claim("a", "QR1").unwrap();
        let restored = ledger.get("a").unwrap();
        assert!(restored.is_matchable());
        assert_eq!(restored.total_rides, 0);
    }

    #[test]
    fn assigned_captain_cannot_go_back_on_duty() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        ledger.try_claim("a", "QR1").unwrap().expect("claim");

        let err = ledger.set_available("a", true).unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert!(ledger.find_candidates(RideClass::Car, 10).unwrap().is_empty());

        ledger.finish_ride("a", "QR1").unwrap();
        ledger.set_available("a", true).unwrap();
        assert!(ledger.get("a").unwrap().is_matchable());
    }

    #[test]
    fn finishing_a_ride_keeps_the_captain_off_duty() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        ledger.try_claim("a", "QR1").unwrap().expect("claim");
        ledger.set_available("a", false).unwrap();

        ledger.finish_ride("a", "QR1").unwrap();
        let a = ledger.get("a").unwrap();
        assert!(a.active_ride.is_none());
        assert!(!a.available);
        assert!(!a.is_matchable());
    }

    #[test]
    fn stale_ride_codes_leave_the_assignment_alone() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        ledger.try_claim("a", "QR1").unwrap().expect("claim");
        ledger.reassign_claim("a", "QR1", "QR2").unwrap();

        ledger.finish_ride("a", "QR1").unwrap();
        ledger.release_claim("a", "QR1").unwrap();
        let a = ledger.get("a").unwrap();
        assert_eq!(a.active_ride.as_deref(), Some("QR2"));
        assert_eq!(a.total_rides, 1);
    }

    #[test]
    fn availability_does_not_touch_approval() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        ledger.set_status("a", ApprovalStatus::Suspended).unwrap();
        ledger.set_available("a", true).unwrap();
        let a = ledger.get("a").unwrap();
        assert_eq!(a.status, ApprovalStatus::Suspended);
        assert!(a.available);
        assert!(ledger.try_claim("a", "QR1").unwrap().is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let ledger = InMemoryCaptainLedger::new();
        ledger.register(captain("a", RideClass::Car)).unwrap();
        let err = ledger.register(captain("a", RideClass::Auto)).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn unknown_captain_is_not_found() {
        let ledger = InMemoryCaptainLedger::new();
        assert_eq!(ledger.set_available("ghost", true).unwrap_err().code(), "not_found");
        assert_eq!(ledger.apply_rating("ghost", 4).unwrap_err().code(), "not_found");
    }

    #[test]
    fn rating_moves_running_mean() {
        let ledger = InMemoryCaptainLedger::with_captains([captain("a", RideClass::Car)]);
        assert_eq!(ledger.apply_rating("a", 5).unwrap(), CaptainRating { average: 5.0, count: 1 });
        assert_eq!(ledger.apply_rating("a", 3).unwrap(), CaptainRating { average: 4.0, count: 2 });
        assert!(ledger.apply_rating("a", 0).is_err());
    }
}
