//! Tunables for the booking core.
//!
//! Every struct deserializes with `#[serde(default)]`, so a config file only
//! needs the fields it overrides.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Coordinates, RideClass};

/// India Standard Time, +05:30.
const DEFAULT_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Per-class tariff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub per_km: f64,
    pub minimum_fare: f64,
    pub per_minute: f64,
    /// Typical city speed, used for the duration estimate.
    pub average_speed_kmh: f64,
    /// Charged per minute of waiting beyond the free allowance.
    pub waiting_per_minute: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateCards {
    pub light: RateCard,
    pub auto: RateCard,
    pub car: RateCard,
}

impl RateCards {
    pub fn get(&self, class: RideClass) -> &RateCard {
        match class {
            RideClass::Light => &self.light,
            RideClass::Auto => &self.auto,
            RideClass::Car => &self.car,
        }
    }
}

impl Default for RateCards {
    fn default() -> Self {
        Self {
            light: RateCard {
                per_km: 8.0,
                minimum_fare: 25.0,
                per_minute: 2.0,
                average_speed_kmh: 25.0,
                waiting_per_minute: 1.0,
            },
            auto: RateCard {
                per_km: 12.0,
                minimum_fare: 40.0,
                per_minute: 3.0,
                average_speed_kmh: 20.0,
                waiting_per_minute: 1.5,
            },
            car: RateCard {
                per_km: 15.0,
                minimum_fare: 60.0,
                per_minute: 4.0,
                average_speed_kmh: 22.0,
                waiting_per_minute: 2.0,
            },
        }
    }
}

/// Independent multiplicative surge factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeConfig {
    /// 08:00–10:59 and 18:00–20:59 local.
    pub peak_hours: f64,
    /// 22:00–06:59 local.
    pub night: f64,
    pub weekend: f64,
    pub high_demand: f64,
    pub rain: f64,
    /// Chance that a quote is priced as if it were raining.
    pub rain_probability: f64,
    pub cap: f64,
    /// Lower-case zone names matched as substrings of the pickup text.
    pub high_demand_areas: Vec<String>,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            peak_hours: 1.5,
            night: 1.3,
            weekend: 1.2,
            high_demand: 1.3,
            rain: 1.8,
            rain_probability: 0.3,
            cap: 3.0,
            high_demand_areas: ["mg road", "koramangala", "whitefield", "electronic city", "airport"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub rates: RateCards,
    pub surge: SurgeConfig,
    /// Share of the per-minute fare folded into the pre-surge total.
    pub time_weight: f64,
    /// Traffic buffer added to the raw duration estimate.
    pub traffic_buffer: f64,
    pub minimum_minutes: u32,
    pub tax_rate: f64,
    pub platform_fee: f64,
    pub free_waiting_minutes: u32,
    /// Offset used to derive local hour and weekday from the scheduled time.
    pub utc_offset_secs: i32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rates: RateCards::default(),
            surge: SurgeConfig::default(),
            time_weight: 0.3,
            traffic_buffer: 0.2,
            minimum_minutes: 10,
            tax_rate: 0.05,
            platform_fee: 10.0,
            free_waiting_minutes: 3,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
        }
    }
}

impl PricingConfig {
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityAnchor {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Bounding box of the serviced region, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl ServiceArea {
    pub fn contains(&self, point: Coordinates) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Checked in order; the first name found in an address wins.
    pub anchors: Vec<CityAnchor>,
    /// Anchor used when no name matches. Falls back to the first anchor.
    pub default_anchor: String,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub minimum_km: f64,
    pub service_area: ServiceArea,
    pub cache_capacity: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        let anchor = |name: &str, latitude, longitude| CityAnchor {
            name: name.to_string(),
            coordinates: Coordinates { latitude, longitude },
        };
        Self {
            anchors: vec![
                anchor("bangalore", 12.9716, 77.5946),
                anchor("mumbai", 19.0760, 72.8777),
                anchor("delhi", 28.7041, 77.1025),
                anchor("chennai", 13.0827, 80.2707),
                anchor("hyderabad", 17.3850, 78.4867),
            ],
            default_anchor: "bangalore".to_string(),
            jitter_min: 0.8,
            jitter_max: 1.2,
            minimum_km: 1.5,
            service_area: ServiceArea { north: 35.0, south: 8.0, east: 97.0, west: 68.0 },
            cache_capacity: 1_024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Upper bound on captains fetched per matching attempt.
    pub candidate_limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { candidate_limit: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancellationPolicy {
    /// Free cancellation window after booking.
    pub grace_secs: i64,
    pub fee_rate: f64,
    pub fee_cap: f64,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self { grace_secs: 120, fee_rate: 0.10, fee_cap: 50.0 }
    }
}

/// Request field limits, in characters after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingLimits {
    pub passenger_name_min: usize,
    pub passenger_name_max: usize,
    pub address_min: usize,
    pub address_max: usize,
    pub feedback_max: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for BookingLimits {
    fn default() -> Self {
        Self {
            passenger_name_min: 2,
            passenger_name_max: 50,
            address_min: 5,
            address_max: 200,
            feedback_max: 500,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Everything a [`crate::lifecycle::RideService`] is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub geo: GeoConfig,
    pub pricing: PricingConfig,
    pub matching: MatchingConfig,
    pub cancellation: CancellationPolicy,
    pub limits: BookingLimits,
    /// Seed for the shared random source; entropy when absent.
    pub seed: Option<u64>,
}

impl ServiceConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.matching.candidate_limit = limit;
        self
    }

    pub fn with_rain_probability(mut self, probability: f64) -> Self {
        self.pricing.surge.rain_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_utc_offset_secs(mut self, offset: i32) -> Self {
        self.pricing.utc_offset_secs = offset;
        self
    }

    pub fn with_cancellation_grace_secs(mut self, secs: i64) -> Self {
        self.cancellation.grace_secs = secs.max(0);
        self
    }
}
