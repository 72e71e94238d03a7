//! Payment callbacks against a real PostgreSQL: authentication, idempotent replays,
//! no downgrade of PAID, and seat release on expiry.

mod common;

use sqlx::PgPool;
use uuid::Uuid;

use cinema_server::models::booking::{BookingStatus, CreateBookingRequest};
use cinema_server::models::webhook::InvoiceCallback;
use cinema_server::services::booking::BookingLedger;
use cinema_server::services::catalog::CatalogStore;
use cinema_server::services::reconciler::{CallbackOutcome, PaymentReconciler};
use cinema_server::utils::error::AppError;

const TOKEN: &str = "callback-secret";

struct Fixture {
    db: common::TestDb,
    ledger: BookingLedger,
    reconciler: PaymentReconciler,
    owner: Uuid,
    showtime_id: Uuid,
    booking_id: Uuid,
}

async fn pending_booking() -> Fixture {
    let db = common::setup().await;
    let catalog = CatalogStore::new(db.pool.clone());
    let ledger = BookingLedger::new(db.pool.clone(), None);
    let reconciler = PaymentReconciler::new(db.pool.clone(), Some(TOKEN.to_string()));
    let showtime = common::bookable_showtime(&catalog).await;
    let owner = common::insert_user(&db.pool, "Owner").await;

    let receipt = ledger
        .create_booking(
            owner,
            &CreateBookingRequest {
                showtime_id: showtime.id,
                seat_labels: vec!["D4".into(), "D5".into()],
            },
        )
        .await
        .unwrap();

    Fixture {
        booking_id: receipt.booking.booking.id,
        showtime_id: showtime.id,
        db,
        ledger,
        reconciler,
        owner,
    }
}

fn callback(booking_id: Uuid, status: &str) -> InvoiceCallback {
    InvoiceCallback {
        id: "inv_123".to_string(),
        external_id: booking_id.to_string(),
        status: status.to_string(),
        amount: None,
        paid_amount: None,
        paid_at: None,
        payer_email: None,
        payment_method: Some("BANK_TRANSFER".to_string()),
        currency: Some("IDR".to_string()),
    }
}

async fn status_of(pool: &PgPool, booking_id: Uuid) -> BookingStatus {
    sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_paid_callback_is_idempotent() {
    let f = pending_booking().await;

    let first = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "PAID"), Some(TOKEN))
        .await
        .unwrap();
    assert_eq!(first, CallbackOutcome::Paid);

    let replay = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "SETTLED"), Some(TOKEN))
        .await
        .unwrap();
    assert_eq!(replay, CallbackOutcome::AlreadyPaid);

    let booking = f.ledger.get_booking(f.booking_id, f.owner).await.unwrap();
    assert_eq!(booking.booking.status, BookingStatus::Paid);
    assert_eq!(booking.booking.payment_reference.as_deref(), Some("inv_123"));
    assert_eq!(booking.tickets.len(), 2);
}

#[tokio::test]
async fn test_late_expiry_never_downgrades_paid() {
    let f = pending_booking().await;
    f.reconciler
        .handle_callback(&callback(f.booking_id, "PAID"), Some(TOKEN))
        .await
        .unwrap();

    let outcome = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "EXPIRED"), Some(TOKEN))
        .await
        .unwrap();

    assert_eq!(outcome, CallbackOutcome::ExpiryIgnoredForPaid);
    assert_eq!(status_of(&f.db.pool, f.booking_id).await, BookingStatus::Paid);
    let occupied = f.ledger.occupied_seats(f.showtime_id).await.unwrap();
    assert_eq!(occupied.occupied_seats, vec!["D4", "D5"]);
}

#[tokio::test]
async fn test_expiry_releases_seats_once() {
    let f = pending_booking().await;

    let outcome = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "EXPIRED"), Some(TOKEN))
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Expired);
    assert_eq!(
        status_of(&f.db.pool, f.booking_id).await,
        BookingStatus::Cancelled
    );
    assert!(f
        .ledger
        .occupied_seats(f.showtime_id)
        .await
        .unwrap()
        .occupied_seats
        .is_empty());

    let replay = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "EXPIRED"), Some(TOKEN))
        .await
        .unwrap();
    assert_eq!(replay, CallbackOutcome::AlreadyReleased);
}

#[tokio::test]
async fn test_payment_after_release_leaves_booking_cancelled() {
    let f = pending_booking().await;
    f.ledger.cancel(f.booking_id, f.owner).await.unwrap();

    let outcome = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "PAID"), Some(TOKEN))
        .await
        .unwrap();

    assert_eq!(outcome, CallbackOutcome::PaidAfterRelease);
    assert_eq!(
        status_of(&f.db.pool, f.booking_id).await,
        BookingStatus::Cancelled
    );
}

#[tokio::test]
async fn test_rejected_callbacks_change_nothing() {
    let f = pending_booking().await;

    for token in [None, Some(""), Some("wrong-secret")] {
        let err = f
            .reconciler
            .handle_callback(&callback(f.booking_id, "PAID"), token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    let err = f
        .reconciler
        .handle_callback(&callback(Uuid::new_v4(), "PAID"), Some(TOKEN))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let unconfigured = PaymentReconciler::new(f.db.pool.clone(), None);
    let err = unconfigured
        .handle_callback(&callback(f.booking_id, "PAID"), Some(TOKEN))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    assert_eq!(
        status_of(&f.db.pool, f.booking_id).await,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_unhandled_statuses_are_ignored() {
    let f = pending_booking().await;

    let outcome = f
        .reconciler
        .handle_callback(&callback(f.booking_id, "PENDING"), Some(TOKEN))
        .await
        .unwrap();

    assert_eq!(outcome, CallbackOutcome::Ignored("PENDING".to_string()));
    assert_eq!(
        status_of(&f.db.pool, f.booking_id).await,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_racing_payment_has_one_consistent_result() {
    let f = pending_booking().await;

    let ledger = f.ledger.clone();
    let (booking_id, owner) = (f.booking_id, f.owner);
    let cancel = tokio::spawn(async move { ledger.cancel(booking_id, owner).await });

    let reconciler = f.reconciler.clone();
    let paid = tokio::spawn(async move {
        reconciler
            .handle_callback(&callback(booking_id, "PAID"), Some(TOKEN))
            .await
    });

    let cancel = cancel.await.expect("task panicked");
    let paid = paid.await.expect("task panicked").unwrap();
    let occupied = f.ledger.occupied_seats(f.showtime_id).await.unwrap();

    match status_of(&f.db.pool, f.booking_id).await {
        BookingStatus::Paid => {
            assert_eq!(paid, CallbackOutcome::Paid);
            assert!(matches!(cancel, Err(AppError::Validation(_))));
            assert_eq!(occupied.total_occupied, 2);
        }
        BookingStatus::Cancelled => {
            assert_eq!(paid, CallbackOutcome::PaidAfterRelease);
            assert!(cancel.is_ok());
            assert_eq!(occupied.total_occupied, 0);
        }
        other => panic!("unexpected final status {other:?}"),
    }
}
