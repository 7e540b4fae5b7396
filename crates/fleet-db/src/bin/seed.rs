//! # Seed Data Generator
//!
//! Populates a development database with cars, users and a subscription.
//!
//! ## Usage
//! ```bash
//! # Generate 40 cars (default)
//! cargo run -p fleet-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p fleet-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p fleet-db --bin seed -- --db ./data/fleet.db
//! ```
//!
//! ## Generated Data
//! - Cars with plates `{CITY}{NNNN}` spread over a few cities, every fifth
//!   one in MAINTENANCE, rates between 0.25 and 0.95 per unit
//! - Three riders; the first one holds a 1_MONTH subscription
//! - One completed demo trip so listings and history are not empty

use fleet_cache::CacheConfig;
use fleet_core::money::fare;
use fleet_core::{
    CarFilter, CarStatus, NewCar, NewUser, PaymentMethod, Rate, StopTripRequest, SubscriptionTier,
    ValidationLimits,
};
use fleet_db::migrations::migration_status;
use fleet_db::{DbConfig, Fleet, FleetConfig};
use rust_decimal::Decimal;
use std::env;

/// City code (plate prefix) and the location stored on the car.
const CITIES: &[(&str, &str)] = &[
    ("ATH", "ATHENS"),
    ("THE", "THESSALONIKI"),
    ("PAT", "PATRAS"),
    ("HER", "HERAKLION"),
];

const MODELS: &[(&str, &str)] = &[
    ("Toyota", "Yaris"),
    ("Toyota", "Corolla"),
    ("Volkswagen", "Golf"),
    ("Volkswagen", "Polo"),
    ("Renault", "Clio"),
    ("Peugeot", "208"),
    ("Fiat", "500"),
    ("Hyundai", "i20"),
    ("Kia", "Picanto"),
    ("Tesla", "Model 3"),
];

/// Price per distance unit, one of them below a cent
const RATES: &[&str] = &["0.25", "0.35", "0.50", "0.125", "0.65", "0.80", "0.95"];

const RIDERS: &[(&str, &str, &str)] = &[
    ("maria@example.com", "maria", "Maria Papadopoulou"),
    ("nikos@example.com", "nikos", "Nikos Georgiou"),
    ("eleni@example.com", "eleni", "Eleni Dimitriou"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fleet_db::logging::init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = String::from("./fleet_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Fleet Rental Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of cars to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: ./fleet_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Fleet Rental Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!("Cars:     {}", count);
    println!();

    let config = FleetConfig {
        database: DbConfig::new(&db_path),
        cache: CacheConfig::default(),
        limits: ValidationLimits::default(),
    };
    let fleet = Fleet::connect(&config).await?;

    let (total, applied) = migration_status(fleet.database().pool()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied ({}/{})", applied, total);

    // Check existing cars
    let existing = fleet.database().cars().count(None).await?;
    if existing > 0 {
        println!("⚠ Database already has {} cars", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Riders
    println!();
    println!("Creating riders...");
    for (email, username, full_name) in RIDERS {
        fleet
            .users()
            .ensure_user(NewUser {
                email: email.to_string(),
                username: username.to_string(),
                full_name: Some(full_name.to_string()),
            })
            .await?;
    }
    println!("✓ {} riders", RIDERS.len());

    // Cars
    println!();
    println!("Generating cars...");
    let start = std::time::Instant::now();
    let mut generated = 0;

    for index in 0..count {
        let (code, location) = CITIES[index % CITIES.len()];
        let (make, model) = MODELS[index % MODELS.len()];
        let status = if index % 5 == 4 {
            Some(CarStatus::Maintenance)
        } else {
            None
        };

        let car = NewCar {
            license_plate: format!("{}{:04}", code, index + 1),
            make: make.to_string(),
            model: model.to_string(),
            cost_per_unit: RATES[index % RATES.len()].parse::<Rate>()?,
            location: location.to_string(),
            status,
        };

        if let Err(e) = fleet.directory().insert(car).await {
            eprintln!("Failed to insert car #{}: {}", index + 1, e);
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {} cars in {:?}", generated, start.elapsed());

    // Subscription
    let (subscriber, _, _) = RIDERS[0];
    let subscription = fleet
        .subscriptions()
        .buy(subscriber, SubscriptionTier::OneMonth)
        .await?;
    println!(
        "✓ {} subscribed ({}, until {})",
        subscriber,
        subscription.tier,
        subscription.end_date.date_naive()
    );

    // Demo trip
    let available = fleet.directory().list(CarFilter::Available, 1, 1).await?;
    if let Some(car) = available.items.first() {
        let (rider, _, _) = RIDERS[1];
        let distance = Decimal::new(125, 1);
        let amount = fare(distance, car.cost_per_unit).ok_or("fare overflow")?;

        fleet.rentals().start_trip(rider, &car.license_plate).await?;
        let receipt = fleet
            .rentals()
            .stop_trip(
                rider,
                StopTripRequest {
                    distance,
                    driving_behavior: 8.5,
                    amount: amount.to_decimal(),
                    payment_method: PaymentMethod::Card,
                },
            )
            .await?;

        println!();
        println!(
            "✓ Demo trip {} on {}: {} via {}",
            receipt.trip.id,
            car.license_plate,
            receipt.payment.amount(),
            receipt.payment.payment_method
        );
    }

    // Summary
    println!();
    for filter in [
        CarFilter::All,
        CarFilter::Available,
        CarFilter::Rented,
        CarFilter::Maintenance,
    ] {
        let page = fleet.directory().list(filter, 1, 1).await?;
        println!("  {:<12} {}", filter.tag(), page.total_count);
    }

    println!();
    println!("🎉 Seed complete!");

    fleet.database().close().await;
    Ok(())
}
