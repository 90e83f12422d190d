//! Property checks for quoting and distance estimation.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use ride_core::config::{GeoConfig, PricingConfig};
use ride_core::geo::GeoEstimator;
use ride_core::model::RideClass;
use ride_core::pricing::PricingEngine;
use ride_core::random::{FixedRandom, SeededRandom};

fn class_strategy() -> impl Strategy<Value = RideClass> {
    prop_oneof![Just(RideClass::Light), Just(RideClass::Auto), Just(RideClass::Car)]
}

proptest! {
    #[test]
    fn surge_stays_between_one_and_the_cap(
        minutes in 0i64..(60 * 24 * 14),
        pickup in "[a-zA-Z ,]{0,40}",
        rain in 0.0f64..1.0,
    ) {
        let engine = PricingEngine::new(PricingConfig::default(), Arc::new(FixedRandom(rain)));
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let (multiplier, reasons) = engine.surge(at, &pickup);
        prop_assert!((1.0..=3.0).contains(&multiplier), "{multiplier}");
        prop_assert_eq!(reasons.is_empty(), multiplier == 1.0);
    }

    #[test]
    fn quotes_never_drop_below_the_minimum_fare(
        distance in 0.0f64..400.0,
        class in class_strategy(),
        minutes in 0i64..(60 * 24 * 7),
    ) {
        let engine = PricingEngine::new(PricingConfig::default(), Arc::new(FixedRandom(0.99)));
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let fare = engine.quote(distance, class, at, "Indiranagar");
        let minimum = PricingConfig::default().rates.get(class).minimum_fare;

        prop_assert!(fare.final_price >= minimum);
        prop_assert!(fare.estimated_minutes >= 10);
        prop_assert_eq!(fare.taxes, (fare.final_price * 0.05).round());
        prop_assert_eq!(fare.minimum_fare_applied, distance * fare.rate_per_km < minimum);
    }

    #[test]
    fn estimated_distance_is_floored_and_rounded(
        pickup in "\\PC{0,60}",
        drop in "\\PC{0,60}",
        seed in any::<u64>(),
    ) {
        let geo = GeoEstimator::new(GeoConfig::default(), Arc::new(SeededRandom::new(Some(seed))));
        let km = geo.estimate_distance(&pickup, &drop);
        prop_assert!(km >= 1.5);
        prop_assert!(((km * 10.0).round() - km * 10.0).abs() < 1e-6);
        prop_assert!(geo.is_within_service_area(geo.locate(&pickup)));
    }
}
