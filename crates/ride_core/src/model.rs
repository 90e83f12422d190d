//! Ride and captain records plus the closed enumerations they use.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RideError;
use crate::pricing::FareBreakdown;

/// Vehicle category for a trip. Each class has its own rate card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideClass {
    /// Two-wheeler.
    #[serde(alias = "bike")]
    Light,
    /// Three-wheeler.
    Auto,
    #[serde(alias = "cab")]
    Car,
}

impl RideClass {
    pub const ALL: [RideClass; 3] = [RideClass::Light, RideClass::Auto, RideClass::Car];

    pub fn as_str(self) -> &'static str {
        match self {
            RideClass::Light => "light",
            RideClass::Auto => "auto",
            RideClass::Car => "car",
        }
    }
}

impl fmt::Display for RideClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideClass {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "bike" => Ok(RideClass::Light),
            "auto" => Ok(RideClass::Auto),
            "car" | "cab" => Ok(RideClass::Car),
            other => Err(RideError::Validation(format!("invalid ride class '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Searching,
    Accepted,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Any non-terminal status; what operators count as "active".
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Searching => "searching",
            RideStatus::Accepted => "accepted",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(RideStatus::Requested),
            "searching" => Ok(RideStatus::Searching),
            "accepted" => Ok(RideStatus::Accepted),
            "started" => Ok(RideStatus::Started),
            "completed" => Ok(RideStatus::Completed),
            "cancelled" => Ok(RideStatus::Cancelled),
            other => Err(RideError::Validation(format!("invalid ride status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Suspended,
}

/// Which side of the trip performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Passenger,
    Captain,
    System,
}

/// Authenticated caller of a lifecycle operation.
///
/// Identity is supplied by the session layer and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Passenger { rider_id: String },
    Captain { captain_id: String },
    System,
}

impl Actor {
    pub fn passenger(rider_id: impl Into<String>) -> Self {
        Actor::Passenger { rider_id: rider_id.into() }
    }

    pub fn captain(captain_id: impl Into<String>) -> Self {
        Actor::Captain { captain_id: captain_id.into() }
    }

    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Passenger { .. } => ActorRole::Passenger,
            Actor::Captain { .. } => ActorRole::Captain,
            Actor::System => ActorRole::System,
        }
    }

    /// Whether this actor may see and act on `ride`.
    pub fn can_access(&self, ride: &Ride) -> bool {
        match self {
            Actor::Passenger { rider_id } => ride.rider_id == *rider_id,
            Actor::Captain { captain_id } => ride.captain_id.as_deref() == Some(captain_id.as_str()),
            Actor::System => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSlot {
    pub score: u8,
    pub feedback: String,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub by_passenger: Option<RatingSlot>,
    pub by_captain: Option<RatingSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_by: ActorRole,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    pub fee: f64,
}

/// One position report from the trip-tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSample {
    pub coordinates: Coordinates,
    pub speed_kmh: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    /// Append-only.
    pub route: Vec<RouteSample>,
    pub current_location: Option<Coordinates>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub code: String,
    pub rider_id: String,
    pub passenger: PassengerDetails,
    /// `None` only while the ride waits for assignment.
    pub captain_id: Option<String>,
    pub pickup: Location,
    pub drop: Location,
    pub class: RideClass,
    pub scheduled_at: DateTime<Utc>,
    pub estimated_distance_km: f64,
    pub actual_distance_km: Option<f64>,
    pub estimated_minutes: u32,
    pub actual_minutes: Option<u32>,
    pub fare: FareBreakdown,
    pub actual_cost: Option<f64>,
    pub waiting_charge: f64,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub ratings: Ratings,
    pub cancellation: Option<Cancellation>,
    pub tracking: Tracking,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn estimated_cost(&self) -> f64 {
        self.fare.final_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub number: String,
    pub model: String,
}

/// Running mean of every score a captain has received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptainRating {
    pub average: f64,
    pub count: u32,
}

impl Default for CaptainRating {
    fn default() -> Self {
        Self { average: 4.5, count: 0 }
    }
}

impl CaptainRating {
    /// Fold one score into the mean. Old scores are never decayed.
    pub fn apply(&mut self, score: u8) {
        let total = self.average * f64::from(self.count) + f64::from(score);
        let count = self.count + 1;
        self.average = round_dp(total / f64::from(count), 1).clamp(1.0, 5.0);
        self.count = count;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Captain {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub class: RideClass,
    pub vehicle: VehicleDetails,
    pub rating: CaptainRating,
    pub total_rides: u32,
    /// On duty. Operators toggle this; rides never do.
    pub available: bool,
    /// Code of the ride the captain is assigned to, if any.
    #[serde(default)]
    pub active_ride: Option<String>,
    pub status: ApprovalStatus,
}

impl Captain {
    /// A freshly registered captain: pending approval, on duty, default rating.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone_number: impl Into<String>,
        class: RideClass,
        vehicle: VehicleDetails,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone_number: phone_number.into(),
            class,
            vehicle,
            rating: CaptainRating::default(),
            total_rides: 0,
            available: true,
            active_ride: None,
            status: ApprovalStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: ApprovalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_rating(mut self, average: f64, count: u32) -> Self {
        self.rating = CaptainRating { average, count };
        self
    }

    pub fn is_busy(&self) -> bool {
        self.active_ride.is_some()
    }

    pub fn is_matchable(&self) -> bool {
        self.status == ApprovalStatus::Approved && self.available && !self.is_busy()
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
