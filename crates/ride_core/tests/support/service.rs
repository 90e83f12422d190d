#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use ride_core::clock::ManualClock;
use ride_core::ledger::{CaptainLedger, InMemoryCaptainLedger};
use ride_core::lifecycle::{BookingConfirmation, BookingRequest, CompletionReport, RideService, RiderIdentity};
use ride_core::matching::FirstAvailable;
use ride_core::model::{Actor, Captain, Ride, RideClass};
use ride_core::random::SeededRandom;
use ride_core::test_helpers::{approved_captain, test_start, FlakyRideStore, RecordingNotifier};
use ride_core::{Result, ServiceConfig};

pub const PICKUP: &str = "100 Feet Road, Indiranagar, Bangalore";
pub const DROP: &str = "Jayanagar 4th Block, Bangalore";

/// Builder configuration for reproducible services.
#[derive(Clone, Debug)]
pub struct TestServiceConfig {
    pub seed: u64,
    pub service: ServiceConfig,
    pub captains: Vec<Captain>,
    pub failing_notifier: bool,
    pub first_available: bool,
}

impl Default for TestServiceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            // No weather surge so quotes only depend on distance and time.
            service: ServiceConfig::default().with_rain_probability(0.0),
            captains: Vec::new(),
            failing_notifier: false,
            first_available: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct TestServiceBuilder {
    config: TestServiceConfig,
}

impl TestServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_config(mut self, service: ServiceConfig) -> Self {
        self.config.service = service;
        self
    }

    pub fn with_captain(mut self, captain: Captain) -> Self {
        self.config.captains.push(captain);
        self
    }

    /// Approved captains `{prefix}-0 .. {prefix}-{count-1}` of one class.
    pub fn with_fleet(mut self, prefix: &str, class: RideClass, count: usize) -> Self {
        self.config
            .captains
            .extend((0..count).map(|i| approved_captain(&format!("{prefix}-{i}"), class)));
        self
    }

    pub fn with_failing_notifier(mut self) -> Self {
        self.config.failing_notifier = true;
        self
    }

    pub fn with_first_available(mut self) -> Self {
        self.config.first_available = true;
        self
    }

    pub fn build(self) -> TestService {
        let config = self.config;
        let ledger = Arc::new(InMemoryCaptainLedger::with_captains(config.captains));
        let store = Arc::new(FlakyRideStore::new());
        let clock = Arc::new(ManualClock::new(test_start()));
        let notifier = Arc::new(if config.failing_notifier {
            RecordingNotifier::failing()
        } else {
            RecordingNotifier::new()
        });

        let mut builder = RideService::builder(config.service)
            .with_ledger(ledger.clone())
            .with_store(store.clone())
            .with_clock(clock.clone())
            .with_notifier(notifier.clone())
            .with_random(Arc::new(SeededRandom::new(Some(config.seed))));
        if config.first_available {
            builder = builder.with_selector(Box::new(FirstAvailable));
        }
        let service = builder.build().expect("service");

        TestService { service, ledger, store, clock, notifier }
    }
}

pub struct TestService {
    pub service: RideService,
    pub ledger: Arc<InMemoryCaptainLedger>,
    pub store: Arc<FlakyRideStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn identity(rider_id: &str) -> RiderIdentity {
    RiderIdentity::new(rider_id, "9123456780")
}

pub fn request(class: RideClass) -> BookingRequest {
    BookingRequest::new("Ananya Rao", PICKUP, DROP, class)
}

impl TestService {
    pub fn book(&self, rider_id: &str, class: RideClass) -> Result<BookingConfirmation> {
        self.service.create(&identity(rider_id), request(class))
    }

    pub fn captain(&self, captain_id: &str) -> Captain {
        self.ledger.get(captain_id).expect("captain")
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn ride(&self, code: &str) -> Ride {
        self.service.get_ride(&Actor::System, code).expect("ride")
    }

    /// Book, pick up and drop off; returns the completed ride.
    pub fn completed_ride(&self, rider_id: &str, class: RideClass) -> Ride {
        let booking = self.book(rider_id, class).expect("booking");
        let code = booking.ride.code;
        self.service.start(&Actor::System, &code).expect("start");
        self.advance(Duration::minutes(20));
        self.service
            .complete(
                &Actor::System,
                &code,
                CompletionReport { distance_km: 7.4, duration_minutes: 20, cost: None, waiting_minutes: 0 },
            )
            .expect("complete")
    }
}
