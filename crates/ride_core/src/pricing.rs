//! Dynamic fare quoting.
//!
//! Formula: `final = round((max(d * per_km, minimum) + minutes * per_minute * time_weight) * surge)`
//! with `surge` the product of whichever factors apply, clamped to `[1, cap]`.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PricingConfig;
use crate::model::{round_dp, RideClass};
use crate::random::RandomSource;

/// Why a surge factor was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeReason {
    PeakHours,
    Night,
    Weekend,
    HighDemandArea,
    Rain,
}

/// Itemized quote. Fixed at booking time; the actual cost is recorded
/// separately on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base_fare: f64,
    /// Weighted time component, as added before surge.
    pub time_fare: f64,
    pub surge_multiplier: f64,
    pub surge_reasons: Vec<SurgeReason>,
    /// Estimated cost of the ride, surge included, taxes and fees excluded.
    pub final_price: f64,
    pub taxes: f64,
    pub platform_fee: f64,
    pub distance_km: f64,
    pub estimated_minutes: u32,
    pub rate_per_km: f64,
    pub rate_per_minute: f64,
    pub minimum_fare: f64,
    pub surge_applied: bool,
    pub minimum_fare_applied: bool,
}

impl FareBreakdown {
    /// What the passenger is shown as the payable total.
    pub fn total_payable(&self) -> f64 {
        self.final_price + self.taxes + self.platform_fee
    }
}

#[derive(Debug)]
pub struct PricingEngine {
    config: PricingConfig,
    rng: Arc<dyn RandomSource>,
}

impl PricingEngine {
    pub fn new(config: PricingConfig, rng: Arc<dyn RandomSource>) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Distance fare with the class minimum applied.
    pub fn base_fare(&self, distance_km: f64, class: RideClass) -> f64 {
        let rates = self.config.rates.get(class);
        (distance_km * rates.per_km).max(rates.minimum_fare)
    }

    /// Trip minutes at the class's average speed, plus the traffic buffer,
    /// never below the configured minimum.
    pub fn estimated_minutes(&self, distance_km: f64, class: RideClass) -> u32 {
        let speed = self.config.rates.get(class).average_speed_kmh.max(1.0);
        let minutes = (distance_km / speed * 60.0).round().max(0.0);
        let buffer = (minutes * self.config.traffic_buffer).round();
        ((minutes + buffer) as u32).max(self.config.minimum_minutes)
    }

    /// Surge multiplier for a pickup at `scheduled_at`, and the factors that produced it.
    pub fn surge(&self, scheduled_at: DateTime<Utc>, pickup: &str) -> (f64, Vec<SurgeReason>) {
        let surge = &self.config.surge;
        let local = scheduled_at.with_timezone(&self.config.local_offset());
        let hour = local.hour();
        let mut multiplier = 1.0;
        let mut reasons = Vec::new();

        if (8..=10).contains(&hour) || (18..=20).contains(&hour) {
            multiplier *= surge.peak_hours;
            reasons.push(SurgeReason::PeakHours);
        }
        if hour >= 22 || hour <= 6 {
            multiplier *= surge.night;
            reasons.push(SurgeReason::Night);
        }
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            multiplier *= surge.weekend;
            reasons.push(SurgeReason::Weekend);
        }

        let pickup_lower = pickup.to_lowercase();
        if surge
            .high_demand_areas
            .iter()
            .any(|area| pickup_lower.contains(area.as_str()))
        {
            multiplier *= surge.high_demand;
            reasons.push(SurgeReason::HighDemandArea);
        }

        if self.rng.next_unit() < surge.rain_probability {
            multiplier *= surge.rain;
            reasons.push(SurgeReason::Rain);
        }

        (multiplier.clamp(1.0, surge.cap.max(1.0)), reasons)
    }

    pub fn quote(
        &self,
        distance_km: f64,
        class: RideClass,
        scheduled_at: DateTime<Utc>,
        pickup: &str,
    ) -> FareBreakdown {
        let rates = self.config.rates.get(class);
        let base_fare = self.base_fare(distance_km, class);
        let estimated_minutes = self.estimated_minutes(distance_km, class);
        let time_fare = f64::from(estimated_minutes) * rates.per_minute * self.config.time_weight;
        let (surge_multiplier, surge_reasons) = self.surge(scheduled_at, pickup);

        let final_price = ((base_fare + time_fare) * surge_multiplier).round();
        let taxes = (final_price * self.config.tax_rate).round();

        debug!(
            %class,
            distance_km,
            estimated_minutes,
            surge_multiplier,
            final_price,
            "quoted fare"
        );

        FareBreakdown {
            base_fare: base_fare.round(),
            time_fare: time_fare.round(),
            surge_multiplier: round_dp(surge_multiplier, 2),
            surge_applied: surge_multiplier > 1.0,
            surge_reasons,
            final_price,
            taxes,
            platform_fee: self.config.platform_fee,
            distance_km,
            estimated_minutes,
            rate_per_km: rates.per_km,
            rate_per_minute: rates.per_minute,
            minimum_fare: rates.minimum_fare,
            minimum_fare_applied: distance_km * rates.per_km < rates.minimum_fare,
        }
    }

    /// Waiting charge: the first few minutes are free, the rest billed per minute.
    pub fn waiting_charge(&self, waiting_minutes: u32, class: RideClass) -> f64 {
        let free = self.config.free_waiting_minutes;
        if waiting_minutes <= free {
            return 0.0;
        }
        f64::from(waiting_minutes - free) * self.config.rates.get(class).waiting_per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;
    use chrono::TimeZone;

    /// 2024-03-04 is a Monday; 06:30 UTC is 12:00 IST.
    fn weekday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 6, 30, 0).unwrap()
    }

    fn ist(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap() - chrono::Duration::minutes(330)
    }

    fn dry_engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default(), Arc::new(FixedRandom(0.9)))
    }

    fn rainy_engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default(), Arc::new(FixedRandom(0.1)))
    }

    #[test]
    fn quote_without_surge_adds_weighted_time() {
        let fare = dry_engine().quote(5.0, RideClass::Car, weekday_noon(), "Indiranagar");
        // base 75, minutes round(13.6)=14 + round(2.8)=3 -> 17, time 17 * 4 * 0.3 = 20.4
        assert_eq!(fare.base_fare, 75.0);
        assert_eq!(fare.estimated_minutes, 17);
        assert_eq!(fare.time_fare, 20.0);
        assert_eq!(fare.surge_multiplier, 1.0);
        assert!(!fare.surge_applied);
        assert_eq!(fare.final_price, 95.0);
        assert_eq!(fare.taxes, 5.0);
        assert_eq!(fare.platform_fee, 10.0);
        assert!(!fare.minimum_fare_applied);
        assert_eq!(fare.total_payable(), 110.0);
    }

    #[test]
    fn short_trips_pay_the_minimum_fare() {
        let fare = dry_engine().quote(2.0, RideClass::Car, weekday_noon(), "Indiranagar");
        assert_eq!(fare.base_fare, 60.0);
        assert!(fare.minimum_fare_applied);
        assert_eq!(fare.estimated_minutes, 10);
        assert!(fare.final_price >= 60.0);
    }

    #[test]
    fn stacked_surge_is_capped() {
        let saturday_morning = ist(2024, 3, 9, 9);
        let (multiplier, reasons) = rainy_engine().surge(saturday_morning, "MG Road metro");
        assert_eq!(multiplier, 3.0);
        assert_eq!(
            reasons,
            vec![
                SurgeReason::PeakHours,
                SurgeReason::Weekend,
                SurgeReason::HighDemandArea,
                SurgeReason::Rain
            ]
        );
    }

    #[test]
    fn night_window_includes_six_am_but_not_seven() {
        let engine = dry_engine();
        assert_eq!(engine.surge(ist(2024, 3, 5, 6), "x").0, 1.3);
        assert_eq!(engine.surge(ist(2024, 3, 5, 7), "x").0, 1.0);
        assert_eq!(engine.surge(ist(2024, 3, 5, 22), "x").0, 1.3);
    }

    #[test]
    fn peak_window_is_local_time() {
        let engine = dry_engine();
        // 19:00 IST on a Wednesday
        let (multiplier, reasons) = engine.surge(ist(2024, 3, 6, 19), "Jayanagar");
        assert_eq!(multiplier, 1.5);
        assert_eq!(reasons, vec![SurgeReason::PeakHours]);
        // 19:00 UTC is 00:30 IST, which is night, not peak
        let utc_evening = Utc.with_ymd_and_hms(2024, 3, 6, 19, 0, 0).unwrap();
        assert_eq!(engine.surge(utc_evening, "Jayanagar").1, vec![SurgeReason::Night]);
    }

    #[test]
    fn high_demand_zone_match_ignores_case() {
        let (multiplier, reasons) = dry_engine().surge(weekday_noon(), "Terminal 1, AIRPORT Road");
        assert_eq!(multiplier, 1.3);
        assert_eq!(reasons, vec![SurgeReason::HighDemandArea]);
    }

    #[test]
    fn waiting_charge_has_three_free_minutes() {
        let engine = dry_engine();
        assert_eq!(engine.waiting_charge(0, RideClass::Auto), 0.0);
        assert_eq!(engine.waiting_charge(3, RideClass::Car), 0.0);
        assert_eq!(engine.waiting_charge(10, RideClass::Auto), 10.5);
        assert_eq!(engine.waiting_charge(4, RideClass::Light), 1.0);
    }
}
