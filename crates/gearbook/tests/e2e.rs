// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Gearbook pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, the real
//! reservation engine and sync worker, and a scriptable sheet mirror. Tests
//! are independent and order-insensitive. The HTTP tests build a router over
//! the harness subsystems and drive it in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gearbook_api::{ApiAuth, ApiClient, ApiState, RateLimiter, router};
use gearbook_core::GearbookError;
use gearbook_core::types::{BookingStatus, SyncTaskStatus};
use gearbook_engine::{Actor, DayBookingRequest};
use gearbook_storage::queries::{catalog, schedules, sync_queue};
use gearbook_sync::RetryPolicy;
use gearbook_test_utils::TestHarness;
use serde_json::Value;
use tower::ServiceExt;

// ---- Test 1: Day capacity saturates ----

#[tokio::test]
async fn test_day_capacity_saturates() {
    let harness = TestHarness::builder()
        .with_item("camera", 2)
        .build()
        .await
        .unwrap();

    harness.book_day(1, "camera", "2026-01-10").await.unwrap();
    harness.book_day(2, "camera", "2026-01-10").await.unwrap();

    let availability = harness
        .reader
        .get_availability("camera", "2026-01-10")
        .await
        .unwrap();
    assert!(!availability.available);
    assert_eq!(availability.booked_count, 2);
    assert_eq!(availability.total, 2);

    let err = harness
        .book_day(3, "camera", "2026-01-10")
        .await
        .unwrap_err();
    assert!(matches!(err, GearbookError::ItemNotAvailable { .. }));
}

// ---- Test 2: Concurrent creation races for the last unit ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_race_for_last_unit() {
    let harness = TestHarness::builder()
        .with_item("drone", 1)
        .build()
        .await
        .unwrap();

    let mut handles = Vec::new();
    for user_id in 1..=10 {
        let engine = harness.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_day_booking(DayBookingRequest {
                    user_id,
                    item_name: "drone".to_string(),
                    date: "2026-01-12".to_string(),
                    comment: None,
                    user_name: None,
                    user_phone: None,
                })
                .await
        }));
    }

    let mut won = 0;
    let mut lost = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(GearbookError::ItemNotAvailable { .. }) => lost += 1,
            Err(e) => panic!("unexpected booking error: {e}"),
        }
    }
    assert_eq!(won, 1, "exactly one booking should win the last unit");
    assert_eq!(lost, 9);

    let availability = harness
        .reader
        .get_availability("drone", "2026-01-12")
        .await
        .unwrap();
    assert_eq!(availability.booked_count, 1);
    assert!(!availability.available);
}

// ---- Test 3: Hour slot generation tracks bookings ----

#[tokio::test]
async fn test_hour_slots_follow_weekly_schedule() {
    let harness = TestHarness::builder()
        .with_cabinet("Studio", "09:00", "12:00", 60)
        .build()
        .await
        .unwrap();

    // Monday 2026-01-05, 09:00 to 12:00 in 60-minute steps.
    let slots = harness
        .engine
        .available_slots("Studio", "2026-01-05")
        .await
        .unwrap();
    let labels: Vec<String> = slots.iter().map(|s| s.label()).collect();
    assert_eq!(labels, ["09:00-10:00", "10:00-11:00", "11:00-12:00"]);
    assert!(slots.iter().all(|s| s.available));

    harness
        .book_hour(42, "Studio", "2026-01-05", "10:00-11:00")
        .await
        .unwrap();

    let slots = harness
        .engine
        .available_slots("Studio", "2026-01-05")
        .await
        .unwrap();
    assert!(slots[0].available);
    assert!(!slots[1].available, "booked slot should read busy");
    assert!(slots[2].available);
}

// ---- Test 4: Schedule override closes the day ----

#[tokio::test]
async fn test_closed_override_empties_the_day() {
    let harness = TestHarness::builder()
        .with_cabinet("Studio", "09:00", "18:00", 60)
        .build()
        .await
        .unwrap();

    let cabinet = catalog::find_cabinet_by_name(&harness.db, "Studio")
        .await
        .unwrap()
        .unwrap();
    schedules::set_override(&harness.db, cabinet.id, "2026-01-06", true, None, None)
        .await
        .unwrap();

    let slots = harness
        .engine
        .available_slots("Studio", "2026-01-06")
        .await
        .unwrap();
    assert!(slots.is_empty(), "closed day should generate no slots");

    let err = harness
        .book_hour(42, "Studio", "2026-01-06", "10:00-11:00")
        .await
        .unwrap_err();
    assert!(matches!(err, GearbookError::SlotMisaligned(_)));
}

// ---- Test 5: Owner cancellation and its guards ----

#[tokio::test]
async fn test_user_cancels_own_hour_booking() {
    let harness = TestHarness::builder()
        .with_cabinet("Studio", "09:00", "18:00", 60)
        .build()
        .await
        .unwrap();

    let booking = harness
        .book_hour(123, "Studio", "2026-01-07", "10:00-11:00")
        .await
        .unwrap();
    let confirmed = harness
        .engine
        .change_hour_status(booking.id, BookingStatus::Confirmed, Actor::manager(900))
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let canceled = harness
        .engine
        .cancel_hour_as_user(booking.id, 123)
        .await
        .unwrap();
    assert_eq!(canceled.status, BookingStatus::Canceled);

    // Repeat cancellation hits the terminal-status guard.
    let err = harness
        .engine
        .cancel_hour_as_user(booking.id, 123)
        .await
        .unwrap_err();
    assert!(matches!(err, GearbookError::AlreadyFinalized(_)));

    // Ownership is checked before status, so a stranger is denied even on a
    // booking that is already terminal.
    let err = harness
        .engine
        .cancel_hour_as_user(booking.id, 124)
        .await
        .unwrap_err();
    assert!(matches!(err, GearbookError::PermissionDenied(_)));
}

// ---- Test 6: Sync retry ladder and the dead-letter sink ----

#[tokio::test]
async fn test_sync_retries_until_the_mirror_recovers() {
    let harness = TestHarness::builder()
        .with_item("camera", 1)
        .with_sheet_failures(1)
        .with_retry_policy(RetryPolicy {
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 3,
        })
        .build()
        .await
        .unwrap();

    let booking = harness.book_day(7, "camera", "2026-01-10").await.unwrap();
    let due = harness.due_tasks().await.unwrap();
    assert_eq!(due.len(), 1);
    let task_id = due[0].id;

    // First attempt trips the scripted outage and schedules a retry.
    harness.drain_sync().await;
    let task = sync_queue::get(&harness.db, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, SyncTaskStatus::Retry);
    assert_eq!(task.retry_count, 1);
    assert!(task.next_retry_at.is_some());
    assert!(harness.sheet.row(booking.id).is_none());

    // Once the outage clears, the next attempt lands the row.
    harness.force_due(task_id).await.unwrap();
    harness.drain_sync().await;
    let task = sync_queue::get(&harness.db, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, SyncTaskStatus::Completed);
    let row = harness.sheet.row(booking.id).unwrap();
    assert_eq!(row.status, "pending");
}

#[tokio::test]
async fn test_exhausted_sync_task_reaches_the_dead_letter_sink() {
    let harness = TestHarness::builder()
        .with_item("camera", 1)
        .with_sheet_failures(10)
        .with_retry_policy(RetryPolicy {
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 3,
        })
        .build()
        .await
        .unwrap();

    harness.book_day(7, "camera", "2026-01-10").await.unwrap();
    let task_id = harness.due_tasks().await.unwrap()[0].id;

    // Three straight failures exhaust max_retries.
    harness.drain_sync().await;
    harness.force_due(task_id).await.unwrap();
    harness.drain_sync().await;
    harness.force_due(task_id).await.unwrap();
    harness.drain_sync().await;

    let task = sync_queue::get(&harness.db, task_id).await.unwrap().unwrap();
    assert_eq!(task.status, SyncTaskStatus::Failed);

    let parked = harness.dead_letters.parked();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].id, task_id);
    assert_eq!(parked[0].status, SyncTaskStatus::Failed);
}

// ---- HTTP edge ----
//
// Tests 7 and 8 mount the API router over the harness subsystems and drive
// it with in-process requests.

fn api_state(harness: &TestHarness, auth: ApiAuth, limiter: RateLimiter) -> ApiState {
    ApiState {
        reader: harness.reader.clone(),
        auth: Arc::new(auth),
        limiter: Arc::new(limiter),
        db: harness.db.clone(),
        sheet: harness.sheet.clone(),
        request_timeout: Duration::from_secs(15),
        metrics_render: None,
    }
}

fn kiosk_get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("x-api-key", "k-kiosk")
        .header("x-api-extra", "s-kiosk")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ---- Test 7: Bulk availability over HTTP ----

#[tokio::test]
async fn test_bulk_availability_skips_unknown_items() {
    let harness = TestHarness::builder()
        .with_item("camera", 2)
        .with_item("lens", 3)
        .build()
        .await
        .unwrap();
    harness.book_day(1, "camera", "2026-01-10").await.unwrap();

    let auth = ApiAuth::new("x-api-key", "x-api-extra", false, Vec::new());
    let app = router(api_state(&harness, auth, RateLimiter::new(100.0, 100)));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/availability/bulk")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"items":["camera","lens","unknown"],"dates":["2026-01-10"]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2, "unknown item should be skipped, not fail");

    let camera = results
        .iter()
        .find(|r| r["item_name"] == "camera")
        .unwrap();
    assert_eq!(camera["booked_count"], 1);
    assert_eq!(camera["total"], 2);
    assert_eq!(camera["available"], true);

    // A malformed date rejects the whole request.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/availability/bulk")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"items":["camera"],"dates":["oops"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---- Test 8: Auth and rate limiting at the edge ----

#[tokio::test]
async fn test_auth_and_rate_limit_guard_the_api() {
    let harness = TestHarness::builder()
        .with_item("camera", 2)
        .build()
        .await
        .unwrap();

    let auth = ApiAuth::new(
        "x-api-key",
        "x-api-extra",
        true,
        vec![ApiClient {
            name: "kiosk".to_string(),
            key: "k-kiosk".to_string(),
            extra: "s-kiosk".to_string(),
            permissions: vec!["read:availability".to_string()],
        }],
    );
    // One token, refilled once per second.
    let app = router(api_state(&harness, auth, RateLimiter::new(1.0, 1)));

    // Missing headers.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/availability/camera?date=2026-01-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid pair, but the catalog listing needs read:items.
    let response = app
        .clone()
        .oneshot(kiosk_get("/api/v1/items"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Auth failures never reach the bucket, so the single token is intact.
    let response = app
        .clone()
        .oneshot(kiosk_get("/api/v1/availability/camera?date=2026-01-10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(kiosk_get("/api/v1/availability/camera?date=2026-01-10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
