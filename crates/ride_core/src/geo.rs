//! Distance estimation from free-text addresses.
//!
//! There is no map data behind this: an address is pinned near the first
//! known city it mentions, offset by a stable hash of its text, and the
//! great-circle distance between two such points is jittered to mimic real
//! road variability. A real geocoder can replace [`GeoEstimator`] without
//! changing the pricing contract.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::trace;

use crate::config::GeoConfig;
use crate::model::{round_dp, Coordinates};
use crate::random::RandomSource;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// 32-bit rolling hash (`h * 31 + unit`) over the UTF-16 code units.
fn address_hash(address: &str) -> i32 {
    address.encode_utf16().fold(0i32, |acc, unit| {
        acc.wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(i32::from(unit))
    })
}

/// Offset in degrees from the anchor, in `[-0.1495, 0.0495]`.
///
/// The remainder keeps the hash's sign, so negative hashes reach three
/// times further south and west than positive ones reach north and east.
fn hash_offset(hash: i32) -> (f64, f64) {
    let hash = i64::from(hash);
    let lat = ((hash % 200) - 100) as f64 / 2000.0;
    let lng = (((hash * 7) % 200) - 100) as f64 / 2000.0;
    (lat, lng)
}

pub struct GeoEstimator {
    config: GeoConfig,
    rng: Arc<dyn RandomSource>,
    resolved: Mutex<LruCache<String, Coordinates>>,
}

impl std::fmt::Debug for GeoEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoEstimator")
            .field("config", &self.config)
            .field("rng", &self.rng)
            .finish_non_exhaustive()
    }
}

impl GeoEstimator {
    pub fn new(config: GeoConfig, rng: Arc<dyn RandomSource>) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            rng,
            resolved: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn anchor_for(&self, address_lower: &str) -> Coordinates {
        let anchors = &self.config.anchors;
        anchors
            .iter()
            .find(|anchor| address_lower.contains(anchor.name.as_str()))
            .or_else(|| {
                anchors
                    .iter()
                    .find(|anchor| anchor.name == self.config.default_anchor)
            })
            .or_else(|| anchors.first())
            .map(|anchor| anchor.coordinates)
            .unwrap_or_else(|| {
                let area = self.config.service_area;
                Coordinates::new((area.north + area.south) / 2.0, (area.east + area.west) / 2.0)
            })
    }

    fn locate_uncached(&self, address: &str) -> Coordinates {
        let anchor = self.anchor_for(&address.to_lowercase());
        let (lat_offset, lng_offset) = hash_offset(address_hash(address));
        Coordinates::new(anchor.latitude + lat_offset, anchor.longitude + lng_offset)
    }

    /// Pseudo-coordinates for an address. Same text, same point.
    pub fn locate(&self, address: &str) -> Coordinates {
        let mut cache = match self.resolved.lock() {
            Ok(guard) => guard,
            Err(_) => return self.locate_uncached(address),
        };
        if let Some(hit) = cache.get(address) {
            return *hit;
        }
        let coordinates = self.locate_uncached(address);
        cache.put(address.to_string(), coordinates);
        coordinates
    }

    /// Jittered road distance in km, one decimal, never below the configured floor.
    pub fn estimate_distance(&self, pickup: &str, drop: &str) -> f64 {
        let from = self.locate(pickup);
        let to = self.locate(drop);
        let straight_km = round_dp(haversine_km(from, to), 2);
        let span = (self.config.jitter_max - self.config.jitter_min).max(0.0);
        let jitter = self.config.jitter_min + self.rng.next_unit() * span;
        let km = round_dp(straight_km * jitter, 1).max(self.config.minimum_km);
        trace!(pickup, drop, straight_km, jitter, km, "estimated distance");
        km
    }

    pub fn is_within_service_area(&self, point: Coordinates) -> bool {
        self.config.service_area.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;

    fn estimator(unit: f64) -> GeoEstimator {
        GeoEstimator::new(GeoConfig::default(), Arc::new(FixedRandom(unit)))
    }

    #[test]
    fn hash_matches_java_style_string_hash() {
        assert_eq!(address_hash(""), 0);
        assert_eq!(address_hash("a"), 97);
        assert_eq!(address_hash("ab"), 97 * 31 + 98);
        // Overflows and wraps like a 32-bit integer.
        assert_eq!(address_hash("hello world"), 1_794_106_052);
    }

    fn within_offset_range(delta: f64) -> bool {
        (-0.15..0.05).contains(&delta)
    }

    #[test]
    fn offsets_stay_within_the_skewed_range() {
        for address in ["MG Road, Bangalore", "Andheri East, Mumbai", "x", "Ünïcødé"] {
            let (lat, lng) = hash_offset(address_hash(address));
            assert!(within_offset_range(lat) && within_offset_range(lng), "{address}: {lat} {lng}");
        }
        let (lat, _) = hash_offset(-199);
        assert_eq!(lat, -0.1495);
        let (lat, _) = hash_offset(199);
        assert_eq!(lat, 0.0495);
    }

    #[test]
    fn locate_uses_matching_city_anchor() {
        let geo = estimator(0.5);
        let mumbai = geo.locate("Bandra West, MUMBAI");
        assert!(within_offset_range(mumbai.latitude - 19.0760), "{mumbai:?}");
        assert!(within_offset_range(mumbai.longitude - 72.8777), "{mumbai:?}");

        let unknown = geo.locate("Somewhere without a city");
        assert!(within_offset_range(unknown.latitude - 12.9716), "{unknown:?}");
        assert_eq!(geo.locate("Somewhere without a city"), unknown);
    }

    #[test]
    fn identical_addresses_hit_the_floor() {
        let geo = estimator(0.99);
        assert_eq!(geo.estimate_distance("Indiranagar", "Indiranagar"), 1.5);
    }

    #[test]
    fn inter_city_distance_is_jittered_within_bounds() {
        let low = estimator(0.0).estimate_distance("Delhi Gate", "Mumbai Central");
        let high = estimator(0.999_999).estimate_distance("Delhi Gate", "Mumbai Central");
        assert!(low > 900.0, "delhi to mumbai is far: {low}");
        assert!(high > low);
        assert!(high / low < 1.51 && high / low > 1.49);
    }

    #[test]
    fn haversine_known_distance() {
        let bangalore = Coordinates::new(12.9716, 77.5946);
        let chennai = Coordinates::new(13.0827, 80.2707);
        let km = haversine_km(bangalore, chennai);
        assert!((km - 290.0).abs() < 5.0, "got {km}");
    }
}
