use super::*;
use crate::calendar::parse_day;
use crate::catalog::{Catalog, RoomType};
use crate::clock::FixedClock;
use crate::limits::*;
use crate::notify::Topic;
use crate::remote::memory::MemoryTable;
use crate::remote::ReservationRow;
use crate::sync::SyncOp;

use chrono::NaiveDate;

fn d(s: &str) -> NaiveDate {
    parse_day(s).unwrap()
}

fn stay(room_type: &str, start: &str, end: &str) -> Reservation {
    Reservation {
        id: ReservationId::generate(),
        guest_name: "Guest".into(),
        phone: None,
        room_type: room_type.into(),
        start_date: d(start),
        end_date: d(end),
        notes: None,
        price: None,
        responsible: None,
        on_clipboard: false,
    }
}

fn candidate(name: &str, room_type: &str, start: &str, end: &str) -> NewReservation {
    NewReservation {
        guest_name: name.into(),
        room_type: room_type.into(),
        start_date: start.into(),
        end_date: end.into(),
        ..Default::default()
    }
}

// ── Availability (pure) ──────────────────────────────────

#[test]
fn occupied_count_empty_is_zero() {
    for room in ["duplo", "casal", "unknown"] {
        assert_eq!(occupied_count(room, d("2025-01-10"), &[]), 0);
    }
}

#[test]
fn checkout_day_is_free() {
    let a = stay("duplo", "2025-01-10", "2025-01-12");
    let b = stay("duplo", "2025-01-12", "2025-01-14");
    assert!(!a.stay().overlaps(&b.stay()));
    let both = [a, b];
    assert_eq!(occupied_count("duplo", d("2025-01-11"), &both), 1);
    assert_eq!(occupied_count("duplo", d("2025-01-12"), &both), 1);
    assert_eq!(occupied_count("duplo", d("2025-01-13"), &both), 1);
    assert_eq!(occupied_count("duplo", d("2025-01-14"), &both), 0);
    assert_eq!(occupied_count("duplo", d("2025-01-09"), &both), 0);
}

#[test]
fn overlapping_stays_overlap() {
    let pairs = [
        (("2025-01-10", "2025-01-15"), ("2025-01-12", "2025-01-13")),
        (("2025-01-10", "2025-01-12"), ("2025-01-11", "2025-01-20")),
        (("2025-01-10", "2025-01-11"), ("2025-01-10", "2025-01-11")),
    ];
    for ((s1, e1), (s2, e2)) in pairs {
        let a = stay("duplo", s1, e1);
        let b = stay("duplo", s2, e2);
        assert!(a.stay().overlaps(&b.stay()), "{s1}..{e1} vs {s2}..{e2}");
        assert!(b.stay().overlaps(&a.stay()));
    }
}

#[test]
fn occupied_count_ignores_other_room_types() {
    let rs = [stay("duplo", "2025-01-10", "2025-01-12"), stay("casal", "2025-01-10", "2025-01-12")];
    assert_eq!(occupied_count("duplo", d("2025-01-10"), &rs), 1);
    assert_eq!(occupied_count("casal", d("2025-01-11"), &rs), 1);
    assert_eq!(occupied_count("solteiro_triplo", d("2025-01-11"), &rs), 0);
}

#[test]
fn percentage_rounds_half_up() {
    assert_eq!(percentage(0, 0), 0);
    assert_eq!(percentage(5, 0), 0);
    assert_eq!(percentage(1, 2), 50);
    assert_eq!(percentage(1, 8), 13); // 12.5
    assert_eq!(percentage(1, 3), 33);
    assert_eq!(percentage(2, 3), 67);
    assert_eq!(percentage(15, 15), 100);
    assert_eq!(percentage(-1, 8), -12); // -12.5
    assert_eq!(percentage(-3, 2), -150);
}

#[test]
fn bands() {
    assert_eq!(AvailabilityBand::from_percentage(-20), AvailabilityBand::None);
    assert_eq!(AvailabilityBand::from_percentage(0), AvailabilityBand::None);
    assert_eq!(AvailabilityBand::from_percentage(1), AvailabilityBand::Low);
    assert_eq!(AvailabilityBand::from_percentage(29), AvailabilityBand::Low);
    assert_eq!(AvailabilityBand::from_percentage(30), AvailabilityBand::Medium);
    assert_eq!(AvailabilityBand::from_percentage(59), AvailabilityBand::Medium);
    assert_eq!(AvailabilityBand::from_percentage(60), AvailabilityBand::High);
    assert_eq!(AvailabilityBand::from_percentage(100), AvailabilityBand::High);
}

#[test]
fn snapshot_matches_occupied_count() {
    let catalog = Catalog::default();
    let reservations = vec![
        stay("duplo", "2025-01-10", "2025-01-12"),
        stay("duplo", "2025-01-11", "2025-01-13"),
        stay("casal_execultivo", "2025-01-11", "2025-01-12"),
        stay("not_in_catalog", "2025-01-11", "2025-01-12"),
    ];
    let day = d("2025-01-11");
    let snap = availability_snapshot(&catalog, day, &reservations);

    assert_eq!(snap.day, day);
    let categories: Vec<_> = snap.categories.iter().map(|c| c.category).collect();
    assert_eq!(categories, vec!["Standard", "Executivo"]);
    for room in catalog.rooms() {
        let got = snap.room(room.id).unwrap();
        let occupied = occupied_count(room.id, day, &reservations);
        assert_eq!(got.occupied, occupied);
        assert_eq!(got.available, i64::from(room.total) - occupied as i64);
    }
    let duplo = snap.room("duplo").unwrap();
    assert_eq!((duplo.occupied, duplo.available, duplo.percentage), (2, 13, 87));
    assert_eq!(duplo.band, AvailabilityBand::High);

    let total: i64 = catalog.rooms().iter().map(|r| i64::from(r.total)).sum();
    assert_eq!(snap.overall.total, total);
    assert_eq!(snap.overall.occupied(), 3); // the uncatalogued stay is not counted
    let per_category: i64 = snap.categories.iter().map(|c| c.tally.available).sum();
    assert_eq!(snap.overall.available, per_category);
}

#[test]
fn snapshot_reports_overbooking_unclamped() {
    let catalog = Catalog::new(vec![RoomType { id: "suite", name: "Suite", category: "Luxo", total: 1 }]);
    let reservations = vec![
        stay("suite", "2025-03-01", "2025-03-03"),
        stay("suite", "2025-03-02", "2025-03-04"),
        stay("suite", "2025-03-02", "2025-03-05"),
    ];
    let snap = availability_snapshot(&catalog, d("2025-03-02"), &reservations);
    let suite = snap.room("suite").unwrap();
    assert_eq!(suite.occupied, 3);
    assert_eq!(suite.available, -2);
    assert_eq!(suite.percentage, -200);
    assert_eq!(suite.band, AvailabilityBand::None);
    assert_eq!(snap.overall.occupancy_percentage(), 300);
}

#[test]
fn snapshot_zero_total_category() {
    let catalog = Catalog::new(vec![RoomType { id: "closed", name: "Closed wing", category: "Reforma", total: 0 }]);
    let snap = availability_snapshot(&catalog, d("2025-03-02"), &[]);
    assert_eq!(snap.categories[0].tally.percentage(), 0);
    assert_eq!(snap.overall.band(), AvailabilityBand::None);
}

// ── Engine ───────────────────────────────────────────────

struct Harness {
    engine: Engine,
    table: Arc<MemoryTable>,
    clock: Arc<FixedClock>,
}

fn harness_with(table: MemoryTable, today: &str) -> Harness {
    let table = Arc::new(table);
    let clock = Arc::new(FixedClock::new(d(today)));
    let engine = Engine::new(table.clone(), table.clone(), clock.clone(), Arc::new(NotifyHub::new()))
        .with_delete_retry_delay(Duration::ZERO);
    Harness { engine, table, clock }
}

fn harness(today: &str) -> Harness {
    harness_with(MemoryTable::new(), today)
}

#[tokio::test]
async fn create_persists_and_notifies() {
    let h = harness("2025-01-01");
    let mut rx = h.engine.notify.subscribe(Topic::RoomType("duplo".into()));

    let r = h
        .engine
        .create_reservation(NewReservation {
            price: Some("320,00".parse().unwrap()),
            ..candidate("Maria", "duplo", "2025-01-10", "2025-01-12")
        })
        .await
        .unwrap();

    let row = h.table.row(r.id.as_str()).await.unwrap();
    assert_eq!(row.guest_name.as_deref(), Some("Maria"));
    assert_eq!(row.price.map(|p| p.cents()), Some(32_000));
    assert_eq!(
        rx.recv().await.unwrap(),
        StoreEvent::Created { id: r.id.clone(), room_type: "duplo".into() }
    );
    assert_eq!(h.engine.get_reservation(&r.id).await.unwrap(), r);
}

#[tokio::test]
async fn failed_persist_rolls_back_create() {
    let h = harness("2025-01-01");
    let mut rx = h.engine.notify.subscribe(Topic::All);
    h.table.fail_next_upserts(1);

    let err = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap_err();
    let EngineError::Sync(sync) = err else { panic!("expected sync error") };
    assert_eq!(sync.op, SyncOp::Persist);
    assert_eq!(h.engine.reservation_count().await, 0);
    assert!(h.table.rows().await.is_empty());
    assert!(matches!(
        rx.recv().await.unwrap(),
        StoreEvent::RolledBack { mutation: MutationKind::Create, .. }
    ));
}

#[tokio::test]
async fn validation_error_leaves_store_untouched() {
    let h = harness("2025-01-01");
    let err = h
        .engine
        .create_reservation(candidate("", "duplo", "2025-01-10", "2025-01-11"))
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(v) => assert_eq!(v.field, "guestName"),
        other => panic!("expected validation error, got {other}"),
    }
    let err = h
        .engine
        .create_reservation(candidate("Ana", "duplo", "2025-01-11", "2025-01-10"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError { rule: ValidationRule::StartNotBeforeEnd, .. })));
    assert_eq!(h.engine.reservation_count().await, 0);
    assert_eq!(h.table.upsert_calls(), 0);
}

#[tokio::test]
async fn failed_persist_restores_previous_version() {
    let h = harness("2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();

    h.table.fail_next_upserts(1);
    let patch = ReservationPatch { guest_name: Some("Maria Clara".into()), room_type: Some("casal".into()), ..Default::default() };
    assert!(matches!(h.engine.update_reservation(&r.id, patch).await, Err(EngineError::Sync(_))));
    assert_eq!(h.engine.get_reservation(&r.id).await.unwrap(), r);
    assert_eq!(h.table.row(r.id.as_str()).await.unwrap().guest_name.as_deref(), Some("Maria"));

    let patch = ReservationPatch { guest_name: Some("Maria Clara".into()), ..Default::default() };
    let updated = h.engine.update_reservation(&r.id, patch).await.unwrap();
    assert_eq!(updated.guest_name, "Maria Clara");
    assert_eq!(h.table.row(r.id.as_str()).await.unwrap().guest_name.as_deref(), Some("Maria Clara"));
}

#[tokio::test]
async fn empty_patch_makes_no_remote_call() {
    let h = harness("2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();
    let calls = h.table.upsert_calls();
    let same = h.engine.update_reservation(&r.id, ReservationPatch::default()).await.unwrap();
    assert_eq!(same, r);
    assert_eq!(h.table.upsert_calls(), calls);
}

#[tokio::test]
async fn toggle_clipboard_round_trip_and_rollback() {
    let h = harness("2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();

    assert!(h.engine.toggle_clipboard(&r.id).await.unwrap());
    assert_eq!(h.table.row(r.id.as_str()).await.unwrap().on_clipboard, Some(true));

    h.table.fail_next_upserts(1);
    assert!(h.engine.toggle_clipboard(&r.id).await.is_err());
    assert!(h.engine.get_reservation(&r.id).await.unwrap().on_clipboard);

    assert!(!h.engine.toggle_clipboard(&r.id).await.unwrap());
}

#[tokio::test]
async fn missing_ids_are_not_found() {
    let h = harness("2025-01-01");
    let ghost = ReservationId::from("ghost");
    assert!(matches!(h.engine.get_reservation(&ghost).await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        h.engine.update_reservation(&ghost, ReservationPatch { notes: Some("x".into()), ..Default::default() }).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(h.engine.toggle_clipboard(&ghost).await, Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.cancel_reservation(&ghost).await, Err(EngineError::NotFound(_))));
    assert_eq!(h.table.delete_calls(), 0);
}

#[tokio::test]
async fn cancel_retries_delete_once() {
    let h = harness("2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();
    h.table.fail_next_deletes(1);

    let outcome = h.engine.cancel_reservation(&r.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Synced(_)));
    assert_eq!(outcome.reservation().id, r.id);
    assert_eq!(h.table.delete_calls(), 2);
    assert!(h.table.row(r.id.as_str()).await.is_none());
    assert_eq!(h.engine.reservation_count().await, 0);
}

#[tokio::test]
async fn cancel_reports_divergence_after_retry() {
    let h = harness("2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();
    let mut rx = h.engine.notify.subscribe(Topic::All);
    h.table.fail_next_deletes(2);

    let outcome = h.engine.cancel_reservation(&r.id).await.unwrap();
    let CancelOutcome::OutOfSync(removed, err) = outcome else { panic!("expected divergence") };
    assert_eq!(removed.id, r.id);
    assert_eq!(err.op, SyncOp::Delete);
    assert_eq!(err.attempts, 2);

    // Local removal is not rolled back; the remote still has the row.
    assert_eq!(h.engine.reservation_count().await, 0);
    assert!(h.table.row(r.id.as_str()).await.is_some());
    assert!(matches!(rx.recv().await.unwrap(), StoreEvent::Cancelled { .. }));
    assert!(matches!(rx.recv().await.unwrap(), StoreEvent::Diverged { .. }));

    // A second cancel of the same id is NotFound, not a silent no-op.
    assert!(matches!(h.engine.cancel_reservation(&r.id).await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn listing_partitions_on_clock_day() {
    let h = harness("2025-06-01");
    h.engine.create_reservation(candidate("Past", "duplo", "2025-05-30", "2025-06-02")).await.unwrap();
    h.engine.create_reservation(candidate("Arriving", "duplo", "2025-06-01", "2025-06-03")).await.unwrap();

    let listing = h.engine.list_reservations(&ReservationFilter::default()).await;
    assert_eq!(listing.today, d("2025-06-01"));
    assert_eq!(listing.current.len(), 1);
    assert_eq!(listing.current[0].guest_name, "Arriving");
    assert!(listing.current[0].is_arrival(listing.today));
    assert_eq!(listing.history.len(), 1);
    assert_eq!(listing.history[0].guest_name, "Past");

    // Membership follows the clock, not a cached partition.
    h.clock.set(d("2025-06-02"));
    let listing = h.engine.list_reservations(&ReservationFilter::default()).await;
    assert!(listing.current.is_empty());
    assert_eq!(listing.history.len(), 2);
}

#[tokio::test]
async fn reload_replaces_cache_and_skips_bad_rows() {
    let good = stay("duplo", "2025-01-10", "2025-01-12");
    let mut bad = ReservationRow::from(&stay("duplo", "2025-01-10", "2025-01-12"));
    bad.start_date = Some("not-a-date".into());
    let h = harness_with(MemoryTable::with_rows(vec![ReservationRow::from(&good), bad]), "2025-01-01");

    h.engine.create_reservation(candidate("Local only", "casal", "2025-02-01", "2025-02-02")).await.unwrap();
    h.table.fail_next_selects(1);
    assert!(matches!(h.engine.reload().await, Err(EngineError::Sync(_))));

    let count = h.engine.reload().await.unwrap();
    // The locally created row was persisted, so it comes back too.
    assert_eq!(count, 2);
    let snapshot = h.engine.snapshot().await;
    assert!(snapshot.iter().any(|r| r.id == good.id));
    assert_eq!(h.engine.occupied_count("duplo", d("2025-01-11")).await, 1);
}

#[tokio::test]
async fn availability_uses_engine_snapshot() {
    let h = harness("2025-01-11");
    h.engine.create_reservation(candidate("A", "duplo", "2025-01-10", "2025-01-12")).await.unwrap();
    h.engine.create_reservation(candidate("B", "duplo", "2025-01-12", "2025-01-14")).await.unwrap();
    for day in ["2025-01-11", "2025-01-12", "2025-01-13"] {
        let snap = h.engine.availability(d(day)).await;
        assert_eq!(snap.room("duplo").unwrap().occupied, 1, "{day}");
        assert_eq!(snap.room("duplo").unwrap().available, 14);
    }
}

#[tokio::test]
async fn custom_catalog_drives_availability() {
    let catalog = Catalog::new(vec![
        RoomType { id: "suite", name: "Suite", category: "Luxo", total: 1 },
        RoomType { id: "loft", name: "Loft", category: "Luxo", total: 3 },
    ]);
    let h = harness("2025-01-01");
    let engine = h.engine.with_catalog(catalog);
    engine.create_reservation(candidate("A", "suite", "2025-01-10", "2025-01-12")).await.unwrap();

    let snap = engine.availability(d("2025-01-10")).await;
    assert!(snap.room("duplo").is_none());
    assert_eq!(snap.room("suite").unwrap().available, 0);
    assert_eq!(snap.room("suite").unwrap().band, AvailabilityBand::None);
    assert_eq!(snap.overall.available, 3);
    assert_eq!(snap.overall.total, 4);
    assert_eq!(snap.overall.percentage(), 75);
    assert_eq!(engine.catalog().display_name("loft"), "Loft");
}

#[tokio::test]
async fn audit_trail_reads_remote_history() {
    let h = harness_with(MemoryTable::new().with_actor("ana"), "2025-01-01");
    let r = h
        .engine
        .create_reservation(candidate("Maria", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();
    h.engine
        .update_reservation(&r.id, ReservationPatch { price: Some(Some(Price::from_cents(10_000).unwrap())), ..Default::default() })
        .await
        .unwrap();
    let trail = h.engine.audit_trail(&r.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].action, AuditAction::Created);
    assert_eq!(trail[1].changed_fields, Some(vec!["price".to_string()]));
    assert_eq!(trail[1].actor.as_deref(), Some("ana"));
}

#[tokio::test]
async fn concurrent_mutations_are_serialized() {
    let h = harness_with(MemoryTable::new().with_latency(Duration::from_millis(5)), "2025-01-01");
    let engine = Arc::new(h.engine);
    let seed = engine
        .create_reservation(candidate("Seed", "duplo", "2025-01-10", "2025-01-12"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        let id = seed.id.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine
                    .create_reservation(candidate(&format!("Guest {i}"), "casal", "2025-01-10", "2025-01-11"))
                    .await
                    .map(|_| ())
            } else {
                engine.toggle_clipboard(&id).await.map(|_| ())
            }
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    // 10 toggles: flag back where it started, and the remote agrees.
    assert_eq!(engine.reservation_count().await, 11);
    assert!(!engine.get_reservation(&seed.id).await.unwrap().on_clipboard);
    assert_eq!(h.table.rows().await.len(), 11);
    assert_eq!(h.table.row(seed.id.as_str()).await.unwrap().on_clipboard, Some(false));
    let ids: std::collections::HashSet<_> = engine.snapshot().await.into_iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 11);
}

#[tokio::test]
async fn reload_rejects_oversized_collection() {
    let rows: Vec<ReservationRow> = (0..=MAX_RESERVATIONS)
        .map(|i| {
            let mut r = stay("duplo", "2025-01-10", "2025-01-12");
            r.id = ReservationId::from(format!("r{i}"));
            ReservationRow::from(&r)
        })
        .collect();
    let h = harness_with(MemoryTable::with_rows(rows), "2025-01-01");
    assert!(matches!(h.engine.reload().await, Err(EngineError::LimitExceeded(_))));
    assert_eq!(h.engine.reservation_count().await, 0);
}
