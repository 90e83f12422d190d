use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::geo::GeoEstimator;
use crate::ledger::{CaptainLedger, InMemoryCaptainLedger};
use crate::lifecycle::RideService;
use crate::locks::KeyLocker;
use crate::matching::{CaptainSelector, MatchingPolicy, RandomSelection};
use crate::model::Captain;
use crate::notify::{LogNotifier, RideNotifier};
use crate::pricing::PricingEngine;
use crate::random::{RandomSource, SeededRandom};
use crate::store::{InMemoryRideStore, RideStore};

/// Assembles a [`RideService`] from a config and optional collaborators.
///
/// Anything not supplied gets the in-memory or default implementation. All
/// randomized components share one random source.
#[derive(Debug, Default)]
pub struct RideServiceBuilder {
    config: ServiceConfig,
    store: Option<Arc<dyn RideStore>>,
    ledger: Option<Arc<dyn CaptainLedger>>,
    notifier: Option<Arc<dyn RideNotifier>>,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Arc<dyn RandomSource>>,
    selector: Option<Box<dyn CaptainSelector>>,
    captains: Vec<Captain>,
}

impl RideServiceBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn with_store(mut self, store: Arc<dyn RideStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn CaptainLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RideNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces the seeded source built from `config.seed`.
    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Replaces the default uniform-random selector.
    pub fn with_selector(mut self, selector: Box<dyn CaptainSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Captains registered into the ledger at build time.
    pub fn with_captains(mut self, captains: impl IntoIterator<Item = Captain>) -> Self {
        self.captains.extend(captains);
        self
    }

    /// Fails if a seeded captain id is already in the ledger.
    pub fn build(self) -> Result<RideService> {
        let config = self.config;
        let rng = self
            .rng
            .unwrap_or_else(|| Arc::new(SeededRandom::new(config.seed)));
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(InMemoryCaptainLedger::new()));
        for captain in self.captains {
            ledger.register(captain)?;
        }
        let selector = self
            .selector
            .unwrap_or_else(|| Box::new(RandomSelection::new(rng.clone())));

        Ok(RideService {
            geo: GeoEstimator::new(config.geo.clone(), rng.clone()),
            pricing: PricingEngine::new(config.pricing.clone(), rng.clone()),
            matching: MatchingPolicy::new(ledger.clone(), selector, config.matching),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryRideStore::new())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            locks: KeyLocker::new(),
            ledger,
            rng,
            config,
        })
    }
}

impl RideService {
    pub fn builder(config: ServiceConfig) -> RideServiceBuilder {
        RideServiceBuilder::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApprovalStatus, RideClass, VehicleDetails};

    #[test]
    fn builds_with_defaults_and_seeded_captains() {
        let captain = Captain::new(
            "c1",
            "Ravi",
            "9876543210",
            RideClass::Auto,
            VehicleDetails { number: "KA 03 GH 3456".into(), model: "Bajaj".into() },
        )
        .with_status(ApprovalStatus::Approved);

        let service = RideService::builder(ServiceConfig::default().with_seed(3))
            .with_captains([captain])
            .build()
            .unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats.total_captains, 1);
        assert_eq!(stats.available_captains, 1);
        assert_eq!(stats.total_rides, 0);
    }

    #[test]
    fn duplicate_seed_captains_fail_the_build() {
        let captain = Captain::new(
            "c1",
            "Ravi",
            "9876543210",
            RideClass::Auto,
            VehicleDetails { number: "KA 03 GH 3456".into(), model: "Bajaj".into() },
        );
        let err = RideServiceBuilder::new(ServiceConfig::default())
            .with_captains([captain.clone(), captain])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
