//! Booking confirmation hook. Delivery is best-effort: a failed notification
//! never undoes a booking.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideConfirmation {
    pub ride_code: String,
    pub pickup: String,
    pub drop: String,
    pub captain_name: String,
    pub captain_phone: String,
    pub vehicle_number: String,
    pub eta_minutes: u32,
}

impl RideConfirmation {
    /// Text body of the confirmation message.
    pub fn message(&self) -> String {
        format!(
            "Ride confirmed! {}\nPickup: {}\nDrop: {}\nCaptain: {} ({})\nVehicle: {}\nArriving in {} mins",
            self.ride_code,
            self.pickup,
            self.drop,
            self.captain_name,
            self.captain_phone,
            self.vehicle_number,
            self.eta_minutes,
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification to {phone_number} failed: {reason}")]
pub struct NotifyError {
    pub phone_number: String,
    pub reason: String,
}

pub trait RideNotifier: Send + Sync + std::fmt::Debug {
    fn notify_ride_confirmed(
        &self,
        phone_number: &str,
        details: &RideConfirmation,
    ) -> Result<(), NotifyError>;
}

/// Logs the message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl RideNotifier for LogNotifier {
    fn notify_ride_confirmed(
        &self,
        phone_number: &str,
        details: &RideConfirmation,
    ) -> Result<(), NotifyError> {
        info!(
            phone_number,
            ride_code = %details.ride_code,
            message = %details.message(),
            "mock ride confirmation sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lists_trip_and_captain() {
        let details = RideConfirmation {
            ride_code: "QR1A2B".into(),
            pickup: "MG Road".into(),
            drop: "Airport".into(),
            captain_name: "Ravi".into(),
            captain_phone: "9876543210".into(),
            vehicle_number: "KA 01 AB 1234".into(),
            eta_minutes: 7,
        };
        let message = details.message();
        assert!(message.starts_with("Ride confirmed! QR1A2B"));
        assert!(message.contains("Captain: Ravi (9876543210)"));
        assert!(message.ends_with("Arriving in 7 mins"));
        assert!(LogNotifier.notify_ride_confirmed("9000000000", &details).is_ok());
    }
}
