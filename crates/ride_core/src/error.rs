//! Error kinds surfaced by the booking core.
//!
//! Every variant is a local, recoverable condition. Nothing here is retried
//! inside the core; callers map the [`RideError::code`] to their transport.

use thiserror::Error;

use crate::model::RideStatus;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum RideError {
    /// Malformed or missing request fields. Raised before any state is touched.
    #[error("code: validation_error, description: {0}")]
    Validation(String),

    #[error("code: no_captain_available, description: no captains available for {0}")]
    NoCaptainAvailable(String),

    /// Unknown id, or a record the requesting actor may not see.
    #[error("code: not_found, description: {0}")]
    NotFound(String),

    #[error("code: invalid_transition, description: cannot {action} a ride that is {from}")]
    InvalidTransition { from: RideStatus, action: &'static str },

    /// Going on duty while still assigned to a ride.
    #[error("code: invalid_transition, description: captain {captain_id} is still assigned to ride {ride_code}")]
    CaptainBusy { captain_id: String, ride_code: String },

    #[error("code: already_rated, description: ride {0} has already been rated")]
    AlreadyRated(String),

    #[error("code: invalid_rating, description: rating must be an integer between 1 and 5, got {0}")]
    InvalidRating(i64),

    /// Persistence collaborator failure.
    #[error("code: storage_error, description: {0}")]
    Storage(String),
}

impl RideError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NoCaptainAvailable(_) => "no_captain_available",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } | Self::CaptainBusy { .. } => "invalid_transition",
            Self::AlreadyRated(_) => "already_rated",
            Self::InvalidRating(_) => "invalid_rating",
            Self::Storage(_) => "storage_error",
        }
    }

    pub(crate) fn invalid_transition(from: RideStatus, action: &'static str) -> Self {
        Self::InvalidTransition { from, action }
    }
}

pub type Result<T, E = RideError> = std::result::Result<T, E>;
