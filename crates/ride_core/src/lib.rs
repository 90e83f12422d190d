pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod matching;
pub mod model;
pub mod notify;
pub mod pricing;
pub mod random;
pub mod store;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use builder::RideServiceBuilder;
pub use config::ServiceConfig;
pub use error::{Result, RideError};
pub use lifecycle::{
    BookingConfirmation, BookingRequest, CompletionReport, FareEstimate, RidePage, RideService,
    RiderIdentity, ServiceStats,
};
pub use model::{Actor, Captain, Ride, RideClass, RideStatus};
