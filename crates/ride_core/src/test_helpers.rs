//! Fixtures shared by unit tests, integration tests, benches and the CLI.
//!
//! Enabled by the `test-helpers` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, RideError};
use crate::model::{ApprovalStatus, Captain, Ride, RideClass, VehicleDetails};
use crate::notify::{NotifyError, RideConfirmation, RideNotifier};
use crate::store::{InMemoryRideStore, RideFilter, RideStore};

/// Monday 2024-03-04 12:00 at +05:30: no peak, night or weekend surge.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 6, 30, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// An approved, available captain with a placeholder vehicle.
pub fn approved_captain(id: &str, class: RideClass) -> Captain {
    Captain::new(
        id,
        format!("Captain {id}"),
        "9000000000",
        class,
        VehicleDetails { number: format!("KA 00 {id}"), model: "Test".into() },
    )
    .with_status(ApprovalStatus::Approved)
}

/// The demo fleet: two bikes, two cars and an auto, all approved.
pub fn sample_captains() -> Vec<Captain> {
    let captain = |id: &str, name: &str, phone: &str, class, number: &str, model: &str, average, count| {
        Captain::new(
            id,
            name,
            phone,
            class,
            VehicleDetails { number: number.into(), model: model.into() },
        )
        .with_rating(average, count)
        .with_status(ApprovalStatus::Approved)
    };
    vec![
        captain("captain-1", "Rajesh Kumar", "9876543210", RideClass::Light, "KA 01 AB 1234", "Honda Activa", 4.8, 125),
        captain("captain-2", "Amit Singh", "8765432109", RideClass::Light, "KA 05 CD 5678", "Bajaj Pulsar", 4.7, 98),
        captain("captain-3", "Priya Sharma", "7654321098", RideClass::Car, "KA 02 EF 9012", "Maruti Swift", 4.9, 234),
        captain("captain-4", "Mohammed Ali", "6543210987", RideClass::Auto, "KA 03 GH 3456", "Bajaj Auto", 4.6, 167),
        captain("captain-5", "Suresh Reddy", "5432109876", RideClass::Car, "KA 04 IJ 7890", "Hyundai i20", 4.5, 89),
    ]
}

/// Notifier that keeps every confirmation, optionally failing each send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, RideConfirmation)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, then reports a delivery failure.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(String, RideConfirmation)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RideNotifier for RecordingNotifier {
    fn notify_ride_confirmed(
        &self,
        phone_number: &str,
        details: &RideConfirmation,
    ) -> std::result::Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((phone_number.to_string(), details.clone()));
        if self.fail {
            return Err(NotifyError {
                phone_number: phone_number.to_string(),
                reason: "gateway unavailable".into(),
            });
        }
        Ok(())
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyRideStore {
    inner: InMemoryRideStore,
    fail_inserts: AtomicBool,
    fail_replaces: AtomicBool,
}

impl FlakyRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_replaces(&self, fail: bool) {
        self.fail_replaces.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl RideStore for FlakyRideStore {
    fn insert(&self, ride: Ride) -> Result<bool> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RideError::Storage("insert rejected".into()));
        }
        self.inner.insert(ride)
    }

    fn get(&self, code: &str) -> Result<Option<Ride>> {
        self.inner.get(code)
    }

    fn replace(&self, ride: Ride) -> Result<()> {
        if self.fail_replaces.load(Ordering::SeqCst) {
            return Err(RideError::Storage("replace rejected".into()));
        }
        self.inner.replace(ride)
    }

    fn list(&self, filter: &RideFilter) -> Result<Vec<Ride>> {
        self.inner.list(filter)
    }
}
