//! Ride lifecycle: booking, trip progress, cancellation and ratings.
//!
//! States run `requested -> searching -> accepted -> started -> completed`,
//! with `cancelled` reachable from every non-terminal state. Booking matches
//! synchronously, so a new ride is stored already `accepted`.
//!
//! Transitions on an existing ride run under that ride's key lock and commit
//! with one store write. Ledger side effects follow the write; if one fails
//! the previous ride record is written back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{BookingLimits, CancellationPolicy, ServiceConfig};
use crate::error::{Result, RideError};
use crate::geo::GeoEstimator;
use crate::ledger::CaptainLedger;
use crate::locks::KeyLocker;
use crate::matching::MatchingPolicy;
use crate::model::{
    round_dp, Actor, ActorRole, ApprovalStatus, Cancellation, Captain, Coordinates, Location,
    PassengerDetails, PaymentStatus, RatingSlot, Ratings, Ride, RideClass, RideStatus,
    RouteSample, Tracking,
};
use crate::notify::{RideConfirmation, RideNotifier};
use crate::pricing::{FareBreakdown, PricingEngine};
use crate::random::RandomSource;
use crate::store::{RideFilter, RideStore};

const CODE_PREFIX: &str = "QR";
const CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_SUFFIX_LEN: usize = 4;
const MAX_CODE_ATTEMPTS: usize = 5;

const ETA_BASE_MINUTES: u32 = 3;
const ETA_SPREAD_MINUTES: usize = 10;

const DEFAULT_CANCEL_REASON: &str = "No reason provided";

/// How far in the past a scheduled time may be before it is rejected.
const SCHEDULE_SLACK_SECS: i64 = 60;

/// What a passenger asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub passenger_name: String,
    pub pickup: String,
    pub drop: String,
    pub class: RideClass,
    /// Pickup time. Now when absent.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl BookingRequest {
    pub fn new(
        passenger_name: impl Into<String>,
        pickup: impl Into<String>,
        drop: impl Into<String>,
        class: RideClass,
    ) -> Self {
        Self {
            passenger_name: passenger_name.into(),
            pickup: pickup.into(),
            drop: drop.into(),
            class,
            scheduled_at: None,
        }
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

/// Authenticated rider placing a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderIdentity {
    pub rider_id: String,
    pub phone_number: String,
}

impl RiderIdentity {
    pub fn new(rider_id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self { rider_id: rider_id.into(), phone_number: phone_number.into() }
    }

    pub fn actor(&self) -> Actor {
        Actor::passenger(self.rider_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub ride: Ride,
    pub captain: Captain,
    pub eta_minutes: u32,
}

/// Trip summary from the tracking collaborator at drop-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub distance_km: f64,
    pub duration_minutes: u32,
    /// Metered cost before waiting charges. The quoted price when absent.
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub waiting_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidePage {
    pub rides: Vec<Ride>,
    pub current: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub total_rides: usize,
    pub active_rides: usize,
    pub completed_rides: usize,
    pub cancelled_rides: usize,
    pub total_captains: usize,
    /// Approved, on duty and not assigned to a ride.
    pub available_captains: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareEstimate {
    pub pickup: Location,
    pub drop: Location,
    pub distance_km: f64,
    pub fare: FareBreakdown,
}

/// Cancellation fee for a ride that had a captain `assigned` and was booked
/// `elapsed` ago. Free inside the grace window or when nobody was assigned.
pub fn cancellation_fee(
    policy: &CancellationPolicy,
    estimated_cost: f64,
    assigned: bool,
    elapsed: Duration,
) -> f64 {
    if !assigned || elapsed <= Duration::seconds(policy.grace_secs) {
        return 0.0;
    }
    round_dp((estimated_cost * policy.fee_rate).min(policy.fee_cap), 2)
}

struct ValidBooking<'a> {
    passenger_name: &'a str,
    pickup: &'a str,
    drop: &'a str,
    scheduled_at: DateTime<Utc>,
}

fn bounded<'a>(field: &str, value: &'a str, min: usize, max: usize) -> Result<&'a str> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(RideError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(trimmed)
}

fn check_schedule(scheduled_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let scheduled_at = scheduled_at.unwrap_or(now);
    if scheduled_at < now - Duration::seconds(SCHEDULE_SLACK_SECS) {
        return Err(RideError::Validation("scheduled time cannot be in the past".into()));
    }
    Ok(scheduled_at)
}

fn validate_booking<'a>(
    limits: &BookingLimits,
    request: &'a BookingRequest,
    now: DateTime<Utc>,
) -> Result<ValidBooking<'a>> {
    Ok(ValidBooking {
        passenger_name: bounded(
            "passenger name",
            &request.passenger_name,
            limits.passenger_name_min,
            limits.passenger_name_max,
        )?,
        pickup: bounded("pickup location", &request.pickup, limits.address_min, limits.address_max)?,
        drop: bounded("drop location", &request.drop, limits.address_min, limits.address_max)?,
        scheduled_at: check_schedule(request.scheduled_at, now)?,
    })
}

fn ride_not_found(code: &str) -> RideError {
    RideError::NotFound(format!("ride {code}"))
}

/// The booking core. Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct RideService {
    pub(crate) config: ServiceConfig,
    pub(crate) store: Arc<dyn RideStore>,
    pub(crate) ledger: Arc<dyn CaptainLedger>,
    pub(crate) notifier: Arc<dyn RideNotifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: Arc<dyn RandomSource>,
    pub(crate) geo: GeoEstimator,
    pub(crate) pricing: PricingEngine,
    pub(crate) matching: MatchingPolicy,
    pub(crate) locks: KeyLocker,
}

impl RideService {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn geo(&self) -> &GeoEstimator {
        &self.geo
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    /// Price a trip without booking it.
    pub fn estimate(
        &self,
        pickup: &str,
        drop: &str,
        class: RideClass,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<FareEstimate> {
        let limits = &self.config.limits;
        let pickup = bounded("pickup location", pickup, limits.address_min, limits.address_max)?;
        let drop = bounded("drop location", drop, limits.address_min, limits.address_max)?;
        let scheduled_at = check_schedule(scheduled_at, self.clock.now())?;

        let (pickup, drop) = self.resolve(pickup, drop)?;
        let distance_km = self.geo.estimate_distance(&pickup.address, &drop.address);
        let fare = self.pricing.quote(distance_km, class, scheduled_at, &pickup.address);
        Ok(FareEstimate { pickup, drop, distance_km, fare })
    }

    /// Validate, price, match and persist a new ride.
    ///
    /// Nothing is stored when no captain is free. A claimed captain is
    /// released again if the ride cannot be stored.
    pub fn create(&self, identity: &RiderIdentity, request: BookingRequest) -> Result<BookingConfirmation> {
        if identity.rider_id.trim().is_empty() {
            return Err(RideError::Validation("rider id is required".into()));
        }
        let now = self.clock.now();
        let booking = validate_booking(&self.config.limits, &request, now)?;
        let (pickup, drop) = self.resolve(booking.pickup, booking.drop)?;
        let distance_km = self.geo.estimate_distance(&pickup.address, &drop.address);
        let fare = self
            .pricing
            .quote(distance_km, request.class, booking.scheduled_at, &pickup.address);

        let code = self.next_code(now);
        let Some(captain) = self
            .matching
            .find_captain(request.class, &pickup.address, &code)?
        else {
            warn!(class = %request.class, rider_id = %identity.rider_id, "no captain available");
            return Err(RideError::NoCaptainAvailable(request.class.to_string()));
        };

        let ride = Ride {
            code,
            rider_id: identity.rider_id.clone(),
            passenger: PassengerDetails {
                name: booking.passenger_name.to_string(),
                phone_number: identity.phone_number.clone(),
            },
            captain_id: Some(captain.id.clone()),
            pickup,
            drop,
            class: request.class,
            scheduled_at: booking.scheduled_at,
            estimated_distance_km: distance_km,
            actual_distance_km: None,
            estimated_minutes: fare.estimated_minutes,
            actual_minutes: None,
            fare,
            actual_cost: None,
            waiting_charge: 0.0,
            status: RideStatus::Accepted,
            payment_status: PaymentStatus::Pending,
            ratings: Ratings::default(),
            cancellation: None,
            tracking: Tracking::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
        };

        let ride = match self.persist_new(ride, &captain.id) {
            Ok(ride) => ride,
            Err((code, err)) => {
                if let Err(release) = self.ledger.release_claim(&captain.id, &code) {
                    warn!(captain_id = %captain.id, error = %release, "failed to release captain claim");
                }
                warn!(captain_id = %captain.id, error = %err, "booking rolled back");
                return Err(err);
            }
        };

        let eta_minutes = ETA_BASE_MINUTES + self.rng.pick_index(ETA_SPREAD_MINUTES) as u32;
        info!(
            ride_code = %ride.code,
            rider_id = %ride.rider_id,
            captain_id = %captain.id,
            class = %ride.class,
            distance_km = ride.estimated_distance_km,
            estimated_cost = ride.estimated_cost(),
            eta_minutes,
            "ride booked"
        );

        let confirmation = RideConfirmation {
            ride_code: ride.code.clone(),
            pickup: ride.pickup.address.clone(),
            drop: ride.drop.address.clone(),
            captain_name: captain.name.clone(),
            captain_phone: captain.phone_number.clone(),
            vehicle_number: captain.vehicle.number.clone(),
            eta_minutes,
        };
        if let Err(err) = self
            .notifier
            .notify_ride_confirmed(&identity.phone_number, &confirmation)
        {
            warn!(ride_code = %ride.code, error = %err, "ride confirmation not delivered");
        }

        Ok(BookingConfirmation { ride, captain, eta_minutes })
    }

    /// Cancel a ride that has not finished. Frees the assigned captain.
    pub fn cancel(&self, actor: &Actor, code: &str, reason: Option<&str>) -> Result<Cancellation> {
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_CANCEL_REASON)
            .to_string();
        let policy = self.config.cancellation;

        let (ride, cancellation) = self.transition(
            actor,
            code,
            |ride, now| {
                if ride.status.is_terminal() {
                    return Err(RideError::invalid_transition(ride.status, "cancel"));
                }
                let fee = cancellation_fee(
                    &policy,
                    ride.estimated_cost(),
                    ride.captain_id.is_some(),
                    now.signed_duration_since(ride.created_at),
                );
                let record = Cancellation { cancelled_by: actor.role(), reason, cancelled_at: now, fee };
                ride.status = RideStatus::Cancelled;
                ride.cancellation = Some(record.clone());
                Ok(record)
            },
            |ride, _| self.free_captain(ride),
        )?;

        info!(
            ride_code = %ride.code,
            cancelled_by = ?cancellation.cancelled_by,
            fee = cancellation.fee,
            "ride cancelled"
        );
        Ok(cancellation)
    }

    /// Record the actor's rating of a completed ride. Passenger scores feed
    /// the captain's running mean.
    pub fn rate(&self, actor: &Actor, code: &str, score: i64, feedback: Option<&str>) -> Result<RatingSlot> {
        let score = u8::try_from(score)
            .ok()
            .filter(|score| (1..=5).contains(score))
            .ok_or(RideError::InvalidRating(score))?;
        let feedback = feedback.map(str::trim).unwrap_or_default().to_string();
        let feedback_max = self.config.limits.feedback_max;
        if feedback.chars().count() > feedback_max {
            return Err(RideError::Validation(format!(
                "feedback must be at most {feedback_max} characters"
            )));
        }
        let role = actor.role();
        if role == ActorRole::System {
            return Err(RideError::Validation(
                "only the passenger or the captain can rate a ride".into(),
            ));
        }

        let (ride, slot) = self.transition(
            actor,
            code,
            |ride, now| {
                if ride.status != RideStatus::Completed {
                    return Err(RideError::invalid_transition(ride.status, "rate"));
                }
                let slot = match role {
                    ActorRole::Passenger => &mut ride.ratings.by_passenger,
                    _ => &mut ride.ratings.by_captain,
                };
                if slot.is_some() {
                    return Err(RideError::AlreadyRated(ride.code.clone()));
                }
                let rating = RatingSlot { score, feedback, rated_at: now };
                *slot = Some(rating.clone());
                Ok(rating)
            },
            |ride, slot| match (role, ride.captain_id.as_deref()) {
                (ActorRole::Passenger, Some(captain_id)) => {
                    let updated = self.ledger.apply_rating(captain_id, slot.score)?;
                    debug!(captain_id, average = updated.average, count = updated.count, "captain rating updated");
                    Ok(())
                }
                _ => Ok(()),
            },
        )?;

        info!(ride_code = %ride.code, rated_by = ?role, score, "ride rated");
        Ok(slot)
    }

    /// Pickup: `accepted -> started`.
    pub fn start(&self, actor: &Actor, code: &str) -> Result<Ride> {
        let (ride, ()) = self.transition(
            actor,
            code,
            |ride, now| {
                if ride.status != RideStatus::Accepted {
                    return Err(RideError::invalid_transition(ride.status, "start"));
                }
                ride.status = RideStatus::Started;
                ride.started_at = Some(now);
                Ok(())
            },
            |_, _| Ok(()),
        )?;
        info!(ride_code = %ride.code, "ride started");
        Ok(ride)
    }

    /// Drop-off: `started -> completed`. Frees the captain.
    pub fn complete(&self, actor: &Actor, code: &str, report: CompletionReport) -> Result<Ride> {
        if !report.distance_km.is_finite() || report.distance_km < 0.0 {
            return Err(RideError::Validation("actual distance must be a non-negative number".into()));
        }
        if report.cost.is_some_and(|cost| !cost.is_finite() || cost < 0.0) {
            return Err(RideError::Validation("actual cost must be a non-negative number".into()));
        }

        let (ride, ()) = self.transition(
            actor,
            code,
            |ride, now| {
                if ride.status != RideStatus::Started {
                    return Err(RideError::invalid_transition(ride.status, "complete"));
                }
                let waiting_charge = self.pricing.waiting_charge(report.waiting_minutes, ride.class);
                let metered = report.cost.unwrap_or_else(|| ride.estimated_cost());
                ride.actual_distance_km = Some(round_dp(report.distance_km, 2));
                ride.actual_minutes = Some(report.duration_minutes);
                ride.waiting_charge = waiting_charge;
                ride.actual_cost = Some(round_dp(metered + waiting_charge, 2));
                ride.ended_at = Some(now);
                ride.status = RideStatus::Completed;
                Ok(())
            },
            |ride, _| self.free_captain(ride),
        )?;

        info!(
            ride_code = %ride.code,
            actual_cost = ?ride.actual_cost,
            waiting_charge = ride.waiting_charge,
            "ride completed"
        );
        Ok(ride)
    }

    /// Append a position report while the ride is `accepted` or `started`.
    pub fn track(&self, actor: &Actor, code: &str, coordinates: Coordinates, speed_kmh: f64) -> Result<Ride> {
        if !(-90.0..=90.0).contains(&coordinates.latitude)
            || !(-180.0..=180.0).contains(&coordinates.longitude)
        {
            return Err(RideError::Validation("coordinates are out of range".into()));
        }
        if !speed_kmh.is_finite() || speed_kmh < 0.0 {
            return Err(RideError::Validation("speed must be a non-negative number".into()));
        }

        let (ride, ()) = self.transition(
            actor,
            code,
            |ride, now| {
                if !matches!(ride.status, RideStatus::Accepted | RideStatus::Started) {
                    return Err(RideError::invalid_transition(ride.status, "track"));
                }
                ride.tracking.route.push(RouteSample { coordinates, speed_kmh, recorded_at: now });
                ride.tracking.current_location = Some(coordinates);
                ride.tracking.last_updated = Some(now);
                Ok(())
            },
            |_, _| Ok(()),
        )?;
        debug!(ride_code = %ride.code, samples = ride.tracking.route.len(), "route sample recorded");
        Ok(ride)
    }

    pub fn get_ride(&self, actor: &Actor, code: &str) -> Result<Ride> {
        self.visible_ride(actor, code)
    }

    /// A rider's rides, newest first. `page` is 1-based.
    pub fn list_rides(
        &self,
        rider_id: &str,
        status: Option<RideStatus>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<RidePage> {
        let limits = &self.config.limits;
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(limits.default_page_size);
        if page == 0 {
            return Err(RideError::Validation("page must be at least 1".into()));
        }
        if limit == 0 || limit > limits.max_page_size {
            return Err(RideError::Validation(format!(
                "limit must be between 1 and {}",
                limits.max_page_size
            )));
        }

        let matching = self
            .store
            .list(&RideFilter::for_rider(rider_id).with_status(status))?;
        let total = matching.len();
        let skip = (page - 1).saturating_mul(limit);
        let rides: Vec<Ride> = matching.into_iter().skip(skip).take(limit).collect();
        let has_next = skip.saturating_add(rides.len()) < total;

        Ok(RidePage { rides, current: page, total_pages: total.div_ceil(limit), has_next, total })
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        let rides = self.store.list(&RideFilter::default())?;
        let captains = self.ledger.list(None)?;
        let count = |status: RideStatus| rides.iter().filter(|ride| ride.status == status).count();

        Ok(ServiceStats {
            total_rides: rides.len(),
            active_rides: rides.iter().filter(|ride| ride.status.is_active()).count(),
            completed_rides: count(RideStatus::Completed),
            cancelled_rides: count(RideStatus::Cancelled),
            total_captains: captains.len(),
            available_captains: captains.iter().filter(|captain| captain.is_matchable()).count(),
        })
    }

    pub fn captains(&self, status: Option<ApprovalStatus>) -> Result<Vec<Captain>> {
        self.ledger.list(status)
    }

    pub fn register_captain(&self, captain: Captain) -> Result<()> {
        self.ledger.register(captain)
    }

    pub fn set_captain_status(&self, captain_id: &str, status: ApprovalStatus) -> Result<()> {
        self.ledger.set_status(captain_id, status)?;
        info!(captain_id, ?status, "captain approval changed");
        Ok(())
    }

    /// Captain going on or off duty. Going on duty fails while a ride is
    /// assigned; going off duty mid-ride holds until an operator says otherwise.
    pub fn set_captain_availability(&self, captain_id: &str, available: bool) -> Result<()> {
        self.ledger.set_available(captain_id, available)?;
        info!(captain_id, available, "captain duty changed");
        Ok(())
    }

    fn resolve(&self, pickup: &str, drop: &str) -> Result<(Location, Location)> {
        let locate = |field: &str, address: &str| {
            let coordinates = self.geo.locate(address);
            if !self.geo.is_within_service_area(coordinates) {
                return Err(RideError::Validation(format!("{field} is outside the service area")));
            }
            Ok(Location { address: address.to_string(), coordinates })
        };
        Ok((locate("pickup location", pickup)?, locate("drop location", drop)?))
    }

    fn next_code(&self, created_at: DateTime<Utc>) -> String {
        let mut code = format!("{CODE_PREFIX}{}", created_at.timestamp_millis());
        for _ in 0..CODE_SUFFIX_LEN {
            let index = self.rng.pick_index(CODE_ALPHABET.len());
            code.push(char::from(CODE_ALPHABET[index]));
        }
        code
    }

    /// Insert a new ride, regenerating its code on collision and moving the
    /// captain's claim along with it. Errors carry the last claimed code.
    fn persist_new(&self, mut ride: Ride, captain_id: &str) -> Result<Ride, (String, RideError)> {
        for attempt in 0..MAX_CODE_ATTEMPTS {
            match self.store.insert(ride.clone()) {
                Ok(true) => return Ok(ride),
                Ok(false) => {}
                Err(err) => return Err((ride.code, err)),
            }
            debug!(ride_code = %ride.code, attempt, "ride code collision");
            let code = self.next_code(ride.created_at);
            if let Err(err) = self.ledger.reassign_claim(captain_id, &ride.code, &code) {
                return Err((ride.code, err));
            }
            ride.code = code;
        }
        Err((
            ride.code,
            RideError::Storage(format!("no unique ride code after {MAX_CODE_ATTEMPTS} attempts")),
        ))
    }

    fn visible_ride(&self, actor: &Actor, code: &str) -> Result<Ride> {
        match self.store.get(code)? {
            Some(ride) if actor.can_access(&ride) => Ok(ride),
            _ => Err(ride_not_found(code)),
        }
    }

    fn free_captain(&self, ride: &Ride) -> Result<()> {
        match ride.captain_id.as_deref() {
            Some(captain_id) => self.ledger.finish_ride(captain_id, &ride.code),
            None => Ok(()),
        }
    }

    /// Load, mutate and store one ride under its key lock.
    ///
    /// `apply` must leave the ride untouched when it fails. `settle` runs
    /// after the write; its failure restores the previous record.
    fn transition<T>(
        &self,
        actor: &Actor,
        code: &str,
        apply: impl FnOnce(&mut Ride, DateTime<Utc>) -> Result<T>,
        settle: impl FnOnce(&Ride, &T) -> Result<()>,
    ) -> Result<(Ride, T)> {
        self.locks.with_lock(code, || {
            let previous = self.visible_ride(actor, code)?;
            let now = self.clock.now();
            let mut ride = previous.clone();
            let outcome = apply(&mut ride, now)?;
            ride.updated_at = now;
            self.store.replace(ride.clone())?;

            if let Err(err) = settle(&ride, &outcome) {
                warn!(ride_code = code, error = %err, "ledger update failed, restoring ride");
                if let Err(restore) = self.store.replace(previous) {
                    warn!(ride_code = code, error = %restore, "failed to restore ride");
                }
                return Err(err);
            }
            Ok((ride, outcome))
        })
    }
}
