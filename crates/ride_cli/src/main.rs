use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ride_core::lifecycle::{BookingConfirmation, BookingRequest, CompletionReport, RiderIdentity};
use ride_core::matching::{BestRated, CaptainSelector, FirstAvailable};
use ride_core::model::{Actor, ApprovalStatus, RideClass};
use ride_core::test_helpers::sample_captains;
use ride_core::{RideService, ServiceConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "ride_core=info,ride_cli=info";

#[derive(Parser)]
#[command(
    name = "ride_cli",
    about = "Quote, inspect and simulate rides against the in-memory booking core"
)]
struct Cli {
    /// JSON config file; omitted fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Seed for every random draw (distance jitter, weather, matching, codes)
    #[arg(long, env = "RIDE_SEED", global = true)]
    seed: Option<u64>,
    /// How a captain is picked from the free pool
    #[arg(long, value_enum, default_value_t = SelectorArg::Random, global = true)]
    selector: SelectorArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a trip without booking it
    Quote {
        #[arg(long)]
        pickup: String,
        #[arg(long)]
        drop: String,
        /// light, auto or car (bike and cab are accepted too)
        #[arg(long, default_value = "car")]
        class: RideClass,
        /// Pickup time as RFC 3339; now when omitted
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the sample fleet
    Captains {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        json: bool,
    },
    /// Book concurrently against the sample fleet, then finish or cancel each ride
    Simulate {
        /// Concurrent booking attempts
        #[arg(long, default_value_t = 12)]
        riders: usize,
        /// Share of successful bookings that get cancelled
        #[arg(long, default_value_t = 0.25)]
        cancel_ratio: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SelectorArg {
    Random,
    First,
    BestRated,
}

impl SelectorArg {
    /// `None` keeps the service's default uniform-random selector.
    fn build(self) -> Option<Box<dyn CaptainSelector>> {
        match self {
            SelectorArg::Random => None,
            SelectorArg::First => Some(Box::new(FirstAvailable)),
            SelectorArg::BestRated => Some(Box::new(BestRated)),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl From<StatusArg> for ApprovalStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ApprovalStatus::Pending,
            StatusArg::Approved => ApprovalStatus::Approved,
            StatusArg::Rejected => ApprovalStatus::Rejected,
            StatusArg::Suspended => ApprovalStatus::Suspended,
        }
    }
}

const PICKUPS: [&str; 4] = [
    "MG Road Metro Station, Bangalore",
    "Indiranagar 100 Feet Road, Bangalore",
    "Koramangala 5th Block, Bangalore",
    "Whitefield ITPL Main Road, Bangalore",
];

const DROPS: [&str; 4] = [
    "Kempegowda International Airport, Bangalore",
    "Jayanagar 4th Block, Bangalore",
    "Electronic City Phase 1, Bangalore",
    "Hebbal Flyover, Bangalore",
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let mut builder = RideService::builder(config).with_captains(sample_captains());
    if let Some(selector) = cli.selector.build() {
        builder = builder.with_selector(selector);
    }
    let service = builder.build().context("failed to build ride service")?;

    match cli.command {
        Commands::Quote { pickup, drop, class, at, json } => quote(&service, &pickup, &drop, class, at, json),
        Commands::Captains { status, json } => captains(&service, status.map(Into::into), json),
        Commands::Simulate { riders, cancel_ratio } => simulate(&service, riders, cancel_ratio),
    }
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let Some(path) = path else {
        return Ok(ServiceConfig::default());
    };
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config = serde_json::from_str(&raw).with_context(|| format!("invalid config in {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn quote(
    service: &RideService,
    pickup: &str,
    drop: &str,
    class: RideClass,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let estimate = service.estimate(pickup, drop, class, at)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    let fare = &estimate.fare;
    println!("{} -> {} ({class})", estimate.pickup.address, estimate.drop.address);
    println!("  distance       {:>8.1} km", estimate.distance_km);
    println!("  duration       {:>8} min", fare.estimated_minutes);
    println!("  base fare      {:>8.2}", fare.base_fare);
    println!("  time fare      {:>8.2}", fare.time_fare);
    println!("  surge          {:>8.2}x {:?}", fare.surge_multiplier, fare.surge_reasons);
    println!("  estimated cost {:>8.2}", fare.final_price);
    println!("  taxes          {:>8.2}", fare.taxes);
    println!("  platform fee   {:>8.2}", fare.platform_fee);
    println!("  payable        {:>8.2}", fare.total_payable());
    Ok(())
}

fn captains(service: &RideService, status: Option<ApprovalStatus>, json: bool) -> Result<()> {
    let captains = service.captains(status)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&captains)?);
        return Ok(());
    }
    for captain in captains {
        println!(
            "{:<10} {:<14} {:<5} {:<14} {:<13} {:.1} ({}) {}",
            captain.id,
            captain.name,
            captain.class,
            captain.vehicle.number,
            captain.vehicle.model,
            captain.rating.average,
            captain.rating.count,
            match (&captain.active_ride, captain.available) {
                (Some(ride_code), _) => format!("on {ride_code}"),
                (None, true) => "available".to_string(),
                (None, false) => "off duty".to_string(),
            },
        );
    }
    Ok(())
}

fn simulate(service: &RideService, riders: usize, cancel_ratio: f64) -> Result<()> {
    let attempts: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..riders)
            .map(|i| {
                scope.spawn(move || {
                    let identity = RiderIdentity::new(format!("rider-{i}"), format!("90000{i:05}"));
                    let request = BookingRequest::new(
                        format!("Rider {i}"),
                        PICKUPS[i % PICKUPS.len()],
                        DROPS[(i / PICKUPS.len()) % DROPS.len()],
                        RideClass::ALL[i % RideClass::ALL.len()],
                    );
                    service.create(&identity, request)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow::anyhow!("booking thread panicked")))
            .collect::<Result<_>>()
    })?;

    let mut bookings: Vec<BookingConfirmation> = Vec::new();
    for attempt in attempts {
        match attempt {
            Ok(booking) => bookings.push(booking),
            Err(err) => warn!(code = err.code(), "booking failed: {err}"),
        }
    }
    println!("booked {} of {riders} requests", bookings.len());

    let cancel_count = (bookings.len() as f64 * cancel_ratio.clamp(0.0, 1.0)).round() as usize;
    for (index, booking) in bookings.iter().enumerate() {
        let ride = &booking.ride;
        let passenger = Actor::passenger(ride.rider_id.clone());
        let captain = Actor::captain(booking.captain.id.clone());

        if index < cancel_count {
            let cancellation = service.cancel(&passenger, &ride.code, Some("plans changed"))?;
            println!("{} cancelled, fee {:.2}", ride.code, cancellation.fee);
            continue;
        }

        service.track(&captain, &ride.code, ride.pickup.coordinates, 0.0)?;
        service.start(&captain, &ride.code)?;
        service.track(&captain, &ride.code, ride.drop.coordinates, 22.0)?;
        let done = service.complete(
            &captain,
            &ride.code,
            CompletionReport {
                distance_km: ride.estimated_distance_km,
                duration_minutes: ride.estimated_minutes,
                cost: None,
                waiting_minutes: (index % 6) as u32,
            },
        )?;
        let score = 3 + (index % 3) as i64;
        service.rate(&passenger, &ride.code, score, Some("simulated"))?;
        service.rate(&captain, &ride.code, 5, None)?;
        println!(
            "{} completed by {}, cost {:.2}, rated {score}",
            ride.code,
            booking.captain.name,
            done.actual_cost.unwrap_or_default()
        );
    }

    let stats = service.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
