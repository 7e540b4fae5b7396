//! Car directory behavior: direct edits, deletes, paging and the
//! cache-aside listing path.

mod common;

use common::*;
use fleet_core::{CarFilter, CarPatch, CarStatus, CoreError, ErrorKind, NewCar, PaymentMethod, Rate};
use fleet_db::FleetError;
use rust_decimal::Decimal;
use std::sync::Arc;

fn rate(per_unit: &str) -> Rate {
    per_unit.parse().unwrap()
}

#[tokio::test]
async fn insert_normalizes_and_rejects_duplicates() {
    let fleet = fleet().await;

    let car = fleet
        .directory()
        .insert(NewCar {
            license_plate: "abc1234".to_string(),
            make: "  Fiat ".to_string(),
            model: "Panda".to_string(),
            cost_per_unit: rate("0.30"),
            location: "Patras".to_string(),
            status: None,
        })
        .await
        .unwrap();

    assert_eq!(car.license_plate, "ABC1234");
    assert_eq!(car.make, "Fiat");
    assert_eq!(car.location, "PATRAS");
    assert_eq!(car.status, CarStatus::Available);

    let err = fleet
        .directory()
        .insert(NewCar {
            license_plate: "ABC1234".to_string(),
            make: "Fiat".to_string(),
            model: "Panda".to_string(),
            cost_per_unit: rate("0.30"),
            location: "Patras".to_string(),
            status: Some(CarStatus::Maintenance),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, FleetError::Core(CoreError::DuplicateCar(_))));
}

#[tokio::test]
async fn insert_rejects_rented_and_bad_rates() {
    let fleet = fleet().await;

    for (status, per_unit) in [
        (Some(CarStatus::Rented), "0.50"),
        (None, "0"),
        (None, "-0.05"),
        (None, "0.0000001"),
    ] {
        let err = fleet
            .directory()
            .insert(NewCar {
                license_plate: "ABC1234".to_string(),
                make: "Fiat".to_string(),
                model: "Panda".to_string(),
                cost_per_unit: rate(per_unit),
                location: "Patras".to_string(),
                status,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    assert_eq!(fleet.database().cars().count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn direct_edits_toggle_maintenance_only() {
    let fleet = standard_fleet().await;

    let car = fleet
        .directory()
        .set_status(PLATE, CarStatus::Maintenance)
        .await
        .unwrap();
    assert_eq!(car.status, CarStatus::Maintenance);

    let err = fleet
        .directory()
        .set_status(PLATE, CarStatus::Rented)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(matches!(
        err,
        FleetError::Core(CoreError::InvalidStatusChange {
            from: CarStatus::Maintenance,
            to: CarStatus::Rented,
            ..
        })
    ));

    let car = fleet
        .directory()
        .set_status(PLATE, CarStatus::Available)
        .await
        .unwrap();
    assert_eq!(car.status, CarStatus::Available);
}

#[tokio::test]
async fn rented_car_is_locked_against_edits_and_delete() {
    let fleet = standard_fleet().await;
    fleet.rentals().start_trip(RIDER, PLATE).await.unwrap();

    let err = fleet
        .directory()
        .set_status(PLATE, CarStatus::Available)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = fleet
        .directory()
        .update(PLATE, CarPatch::new().cost_per_unit(rate("0.10")))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Core(CoreError::CarInUse(_))));

    let err = fleet.directory().delete(PLATE).await.unwrap_err();
    assert!(matches!(err, FleetError::Core(CoreError::CarInUse(_))));

    let car = fleet.directory().get(PLATE).await.unwrap();
    assert_eq!(car.status, CarStatus::Rented);
    assert_eq!(car.cost_per_unit, rate("0.50"));
}

#[tokio::test]
async fn sparse_update_changes_only_given_fields() {
    let fleet = standard_fleet().await;

    let car = fleet
        .directory()
        .update(PLATE, CarPatch::new().location("heraklion").model("Corolla"))
        .await
        .unwrap();

    assert_eq!(car.location, "HERAKLION");
    assert_eq!(car.model, "Corolla");
    assert_eq!(car.make, "Toyota");
    assert_eq!(car.cost_per_unit, rate("0.50"));

    let err = fleet.directory().update(PLATE, CarPatch::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = fleet
        .directory()
        .update("ZZZ9999", CarPatch::new().model("Golf"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_respects_trip_history() {
    let fleet = standard_fleet().await;
    add_car(&fleet, "NEW0001", "0.40").await;

    let deleted = fleet.directory().delete("NEW0001").await.unwrap();
    assert_eq!(deleted.license_plate, "NEW0001");
    let err = fleet.directory().get("NEW0001").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    fleet.rentals().start_trip(RIDER, PLATE).await.unwrap();
    fleet
        .rentals()
        .stop_trip(RIDER, stop_request(Decimal::new(10, 0), 0.8, 500, PaymentMethod::Card))
        .await
        .unwrap();

    let err = fleet.directory().delete(PLATE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, FleetError::Core(CoreError::CarHasHistory(_))));
    assert!(fleet.directory().get(PLATE).await.is_ok());
}

#[tokio::test]
async fn paging_reports_totals_past_the_end() {
    let fleet = fleet().await;
    for plate in ["AAA0001", "AAA0002", "AAA0003"] {
        add_car(&fleet, plate, "0.50").await;
    }

    let page = fleet.directory().list(CarFilter::All, 2, 2).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].license_plate, "AAA0003");
    assert_eq!(page.total_count, 3);
    assert_eq!(page.total_pages(), 2);

    let page = fleet.directory().list(CarFilter::All, 5, 2).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 3);

    for (page, size) in [(0, 10), (1, 0), (1, 101)] {
        let err = fleet
            .directory()
            .list(CarFilter::All, page, size)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }
}

#[tokio::test]
async fn listings_are_cached_and_invalidated_by_rentals() {
    let (fleet, cache) = fleet_with_memory_cache().await;
    add_rider(&fleet, RIDER).await;
    add_car(&fleet, PLATE, "0.50").await;

    let available = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(available.total_count, 1);
    assert!(!cache.is_empty());

    // Served again from the cache.
    let again = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(again, available);

    fleet.rentals().start_trip(RIDER, PLATE).await.unwrap();

    let available = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(available.total_count, 0);
    let rented = fleet.directory().list(CarFilter::Rented, 1, 10).await.unwrap();
    assert_eq!(rented.total_count, 1);
    let all = fleet.directory().list(CarFilter::All, 1, 10).await.unwrap();
    assert_eq!(all.items[0].status, CarStatus::Rented);

    fleet
        .rentals()
        .stop_trip(RIDER, stop_request(Decimal::new(10, 0), 0.8, 500, PaymentMethod::Card))
        .await
        .unwrap();

    let available = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(available.total_count, 1);
    let rented = fleet.directory().list(CarFilter::Rented, 1, 10).await.unwrap();
    assert_eq!(rented.total_count, 0);
}

#[tokio::test]
async fn every_page_size_is_invalidated_by_direct_edits() {
    let (fleet, _cache) = fleet_with_memory_cache().await;
    for plate in ["AAA0001", "AAA0002", "AAA0003"] {
        add_car(&fleet, plate, "0.50").await;
    }

    // Warm unusual page sizes and a deep page.
    for (page, size) in [(1, 1), (3, 1), (1, 7), (1, 100)] {
        fleet.directory().list(CarFilter::Available, page, size).await.unwrap();
    }

    fleet
        .directory()
        .set_status("AAA0003", CarStatus::Maintenance)
        .await
        .unwrap();

    let deep = fleet.directory().list(CarFilter::Available, 3, 1).await.unwrap();
    assert!(deep.items.is_empty());
    assert_eq!(deep.total_count, 2);

    for size in [1, 7, 100] {
        let page = fleet.directory().list(CarFilter::Available, 1, size).await.unwrap();
        assert_eq!(page.total_count, 2);
    }

    let maintenance = fleet.directory().list(CarFilter::Maintenance, 1, 10).await.unwrap();
    assert_eq!(maintenance.total_count, 1);
}

#[tokio::test]
async fn failing_cache_never_fails_requests() {
    let fleet = fleet_with_cache(Arc::new(FailingCache)).await;
    add_rider(&fleet, RIDER).await;
    add_car(&fleet, PLATE, "0.50").await;

    let page = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(page.total_count, 1);

    fleet.rentals().start_trip(RIDER, PLATE).await.unwrap();
    let page = fleet.directory().list(CarFilter::Available, 1, 10).await.unwrap();
    assert_eq!(page.total_count, 0);

    let receipt = fleet
        .rentals()
        .stop_trip(RIDER, stop_request(Decimal::new(10, 0), 0.8, 500, PaymentMethod::Card))
        .await
        .unwrap();
    assert_eq!(receipt.payment.amount_cents, 500);

    let car = fleet
        .directory()
        .set_status(PLATE, CarStatus::Maintenance)
        .await
        .unwrap();
    assert_eq!(car.status, CarStatus::Maintenance);
}

#[tokio::test]
async fn cache_hit_skips_the_database() {
    let fleet = standard_fleet().await;

    let warm = fleet.directory().list(CarFilter::All, 1, 10).await.unwrap();
    assert_eq!(warm.items[0].location, "ATHENS");

    // Written behind the directory's back: no generation bump.
    fleet
        .database()
        .cars()
        .update(PLATE, CarStatus::Available, &CarPatch::new().location("PATRAS"))
        .await
        .unwrap();

    let cached = fleet.directory().list(CarFilter::All, 1, 10).await.unwrap();
    assert_eq!(cached.items[0].location, "ATHENS");

    // A fresh page size is a fresh key.
    let fresh = fleet.directory().list(CarFilter::All, 1, 11).await.unwrap();
    assert_eq!(fresh.items[0].location, "PATRAS");
}
