//! Book one ride per class against the sample fleet and walk each through
//! its lifecycle.
//!
//! Run with: cargo run -p ride_core --example booking_run

use ride_core::lifecycle::{BookingRequest, CompletionReport, RiderIdentity};
use ride_core::model::{Actor, RideClass};
use ride_core::test_helpers::sample_captains;
use ride_core::{RideService, ServiceConfig};

fn main() {
    let service = RideService::builder(ServiceConfig::default().with_seed(123))
        .with_captains(sample_captains())
        .build()
        .expect("sample fleet has unique ids");

    println!("--- Booking run (5 captains, seed 123) ---");
    for (i, class) in RideClass::ALL.into_iter().enumerate() {
        let rider = RiderIdentity::new(format!("rider-{i}"), "9123456780");
        let request = BookingRequest::new(
            "Demo Rider",
            "Koramangala 5th Block, Bangalore",
            "Whitefield ITPL Main Road, Bangalore",
            class,
        );
        let booking = match service.create(&rider, request) {
            Ok(booking) => booking,
            Err(err) => {
                println!("{class}: {err}");
                continue;
            }
        };
        let ride = &booking.ride;
        println!(
            "{class}: {} with {} ({}), {:.1} km, est. {:.0} (surge {:.2}x), eta {} min",
            ride.code,
            booking.captain.name,
            booking.captain.vehicle.number,
            ride.estimated_distance_km,
            ride.estimated_cost(),
            ride.fare.surge_multiplier,
            booking.eta_minutes,
        );

        let captain = Actor::captain(booking.captain.id.clone());
        service.start(&captain, &ride.code).expect("start");
        let done = service
            .complete(
                &captain,
                &ride.code,
                CompletionReport {
                    distance_km: ride.estimated_distance_km,
                    duration_minutes: ride.estimated_minutes,
                    cost: None,
                    waiting_minutes: 5,
                },
            )
            .expect("complete");
        service
            .rate(&rider.actor(), &ride.code, 5, Some("great ride"))
            .expect("rate");
        println!(
            "{class}: completed, charged {:.2} incl. {:.2} waiting",
            done.actual_cost.unwrap_or_default(),
            done.waiting_charge
        );
    }

    let stats = service.stats().expect("stats");
    println!(
        "Rides: {} total, {} completed; captains available: {}/{}",
        stats.total_rides, stats.completed_rides, stats.available_captains, stats.total_captains
    );
}
