//! Booking ledger: the booking aggregate, its tickets, and customer-driven transitions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::booking::{
    Booking, BookingReceipt, BookingStatus, BookingWithTickets, CreateBookingRequest, Ticket,
};
use crate::models::showtime::OccupiedSeats;
use crate::services::payment::{
    InvoiceItem, InvoiceRequest, InvoiceStatus, PaymentError, PaymentProvider,
};
use crate::services::seats;
use crate::utils::error::AppError;

/// Fresh invoice numbers tried before giving up on a booking insert.
const INVOICE_NUMBER_ATTEMPTS: usize = 5;

const MSG_CREATED: &str = "Booking created successfully";
const MSG_LINK_FAILED: &str =
    "Booking created but payment link generation failed. Please try again later.";
const MSG_LINK_REUSED: &str = "Existing payment link is still valid";
const MSG_LINK_RENEWED: &str = "New payment link generated successfully";

#[derive(Clone)]
pub struct BookingLedger {
    pool: PgPool,
    payments: Option<Arc<dyn PaymentProvider>>,
}

impl BookingLedger {
    pub fn new(pool: PgPool, payments: Option<Arc<dyn PaymentProvider>>) -> Self {
        Self { pool, payments }
    }

    /// Claims the requested seats and records a PENDING booking in one transaction, then
    /// asks the payment provider for a pay link. A failed link request keeps the booking.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: &CreateBookingRequest,
    ) -> Result<BookingReceipt, AppError> {
        let payer_email = self.payer_email(user_id).await?;

        let mut tx = self.pool.begin().await?;

        let showtime =
            seats::load_bookable_showtime(&mut tx, request.showtime_id, Utc::now()).await?;
        let requested = showtime.grid()?.normalize_request(&request.seat_labels)?;
        seats::reject_taken_seats(&mut tx, showtime.id, &requested).await?;

        let total = showtime.price * Decimal::from(requested.len());
        let booking = insert_booking(&mut tx, user_id, total).await?;
        let tickets = seats::claim_seats(&mut tx, booking.id, showtime.id, &requested).await?;

        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            showtime_id = %showtime.id,
            seats = tickets.len(),
            total = %booking.total_amount,
            "Booking created"
        );

        let mut receipt = BookingReceipt {
            booking: BookingWithTickets { booking, tickets },
            payment_url: None,
            message: MSG_CREATED.to_string(),
        };

        match self.issue_payment_link(&receipt.booking, &payer_email).await {
            Ok(updated) => {
                receipt.payment_url = updated.payment_url.clone();
                receipt.booking.booking = updated;
            }
            Err(e) => {
                warn!(booking_id = %receipt.booking.booking.id, error = %e, "Payment link generation failed");
                receipt.message = MSG_LINK_FAILED.to_string();
            }
        }

        Ok(receipt)
    }

    /// Releases the seats of a PENDING booking. Paid and already released bookings are final.
    pub async fn cancel(&self, booking_id: Uuid, owner_id: Uuid) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booking) = cancelled else {
            let current: Option<BookingStatus> =
                sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1 AND user_id = $2")
                    .bind(booking_id)
                    .bind(owner_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match current {
                None => AppError::not_found("Booking", booking_id),
                Some(BookingStatus::Paid) => {
                    AppError::Validation("cannot cancel a paid booking".into())
                }
                Some(_) => AppError::Validation("booking is already cancelled".into()),
            });
        };

        let released = release_tickets(&mut tx, booking_id).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, released, "Booking cancelled");
        Ok(booking)
    }

    /// Hands back a usable pay link for a PENDING booking, reusing the current invoice
    /// while the provider still reports it as pending.
    pub async fn retry_payment(
        &self,
        booking_id: Uuid,
        owner_id: Uuid,
    ) -> Result<BookingReceipt, AppError> {
        let current = self.get_booking(booking_id, owner_id).await?;
        if current.booking.status != BookingStatus::Pending {
            return Err(AppError::Validation(
                "can only retry payment for pending bookings".into(),
            ));
        }

        let provider = self.provider()?;

        if current.booking.payment_url.is_some() {
            match provider.find_invoice_by_external_id(booking_id).await {
                Ok(invoice) if invoice.status == InvoiceStatus::Pending => {
                    debug!(booking_id = %booking_id, invoice_id = %invoice.id, "Reusing pending invoice");
                    return Ok(BookingReceipt {
                        payment_url: current.booking.payment_url.clone(),
                        booking: current,
                        message: MSG_LINK_REUSED.to_string(),
                    });
                }
                Ok(invoice) => {
                    debug!(booking_id = %booking_id, status = ?invoice.status, "Stored invoice is no longer payable");
                }
                Err(e) => {
                    warn!(booking_id = %booking_id, error = %e, "Invoice lookup failed, issuing a new one");
                }
            }
        }

        let payer_email = self.payer_email(owner_id).await?;
        let updated = self.issue_payment_link(&current, &payer_email).await?;

        Ok(BookingReceipt {
            payment_url: updated.payment_url.clone(),
            booking: BookingWithTickets {
                booking: updated,
                tickets: current.tickets,
            },
            message: MSG_LINK_RENEWED.to_string(),
        })
    }

    /// Seats held by PENDING or PAID bookings on a showtime.
    pub async fn occupied_seats(&self, showtime_id: Uuid) -> Result<OccupiedSeats, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM showtimes WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(showtime_id)
        .fetch_one(&self.pool)
        .await?;

        if !exists {
            return Err(AppError::not_found("Showtime", showtime_id));
        }

        let occupied_seats: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.seat_label
            FROM tickets t
            JOIN bookings b ON b.id = t.booking_id
            WHERE t.showtime_id = $1
              AND b.status NOT IN ('CANCELLED', 'EXPIRED')
            ORDER BY substring(t.seat_label, 1, 1), substring(t.seat_label, 2)::int
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(OccupiedSeats {
            showtime_id,
            total_occupied: occupied_seats.len(),
            occupied_seats,
        })
    }

    pub async fn list_bookings(&self, owner_id: Uuid) -> Result<Vec<BookingWithTickets>, AppError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
        let mut tickets_by_booking: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
        for ticket in sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE booking_id = ANY($1) ORDER BY seat_label",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            tickets_by_booking
                .entry(ticket.booking_id)
                .or_default()
                .push(ticket);
        }

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithTickets {
                tickets: tickets_by_booking.remove(&booking.id).unwrap_or_default(),
                booking,
            })
            .collect())
    }

    /// A booking owned by someone else is reported as missing.
    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        owner_id: Uuid,
    ) -> Result<BookingWithTickets, AppError> {
        let booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 AND user_id = $2")
                .bind(booking_id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::not_found("Booking", booking_id))?;

        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE booking_id = $1 ORDER BY seat_label",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(BookingWithTickets { booking, tickets })
    }

    fn provider(&self) -> Result<&Arc<dyn PaymentProvider>, AppError> {
        self.payments
            .as_ref()
            .ok_or_else(|| AppError::PaymentUnavailable(PaymentError::NotConfigured.to_string()))
    }

    /// Customer accounts belong to the auth collaborator; bookings only need the email.
    async fn payer_email(&self, user_id: Uuid) -> Result<String, AppError> {
        sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    /// Requests an invoice and caches its id and URL on the booking, as long as the booking
    /// is still PENDING when the provider answers.
    async fn issue_payment_link(
        &self,
        booking: &BookingWithTickets,
        payer_email: &str,
    ) -> Result<Booking, AppError> {
        let provider = self.provider()?;
        let booking_id = booking.booking.id;

        let status: Option<BookingStatus> =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;
        if status != Some(BookingStatus::Pending) {
            return Err(AppError::Validation("booking is no longer pending".into()));
        }

        let invoice = provider
            .create_invoice(&invoice_request(booking, payer_email))
            .await
            .map_err(payment_failure)?;

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET payment_url = $2, payment_reference = $3, updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(&invoice.invoice_url)
        .bind(&invoice.id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| {
            warn!(
                booking_id = %booking_id,
                invoice_id = %invoice.id,
                "Invoice issued for a booking that is no longer pending"
            );
            AppError::Validation("booking is no longer pending".into())
        })
    }
}

fn payment_failure(err: PaymentError) -> AppError {
    match err {
        PaymentError::NotConfigured | PaymentError::Request(_) => {
            AppError::PaymentUnavailable(err.to_string())
        }
        PaymentError::Api { .. } | PaymentError::Decode(_) | PaymentError::InvoiceNotFound(_) => {
            AppError::ExternalService(err.to_string())
        }
    }
}

/// `INV-YYYYMMDD-XXXXXXXX`, the suffix drawn from a fresh v4 UUID.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix)
}

fn invoice_request(booking: &BookingWithTickets, payer_email: &str) -> InvoiceRequest {
    let header = &booking.booking;
    let seat_count = booking.tickets.len().max(1);
    let unit_price = header.total_amount / Decimal::from(seat_count);

    InvoiceRequest {
        external_id: header.id,
        amount: header.total_amount,
        payer_email: payer_email.to_string(),
        description: format!("Booking - Invoice {}", header.invoice_number),
        items: booking
            .tickets
            .iter()
            .map(|ticket| InvoiceItem {
                name: format!("Seat {}", ticket.seat_label),
                quantity: 1,
                price: unit_price,
            })
            .collect(),
    }
}

async fn insert_booking(
    conn: &mut PgConnection,
    user_id: Uuid,
    total: Decimal,
) -> Result<Booking, AppError> {
    for _ in 0..INVOICE_NUMBER_ATTEMPTS {
        let invoice_number = generate_invoice_number(Utc::now());
        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, user_id, invoice_number, total_amount, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (invoice_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&invoice_number)
        .bind(total)
        .bind(BookingStatus::Pending)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(booking) => return Ok(booking),
            None => warn!(invoice_number = %invoice_number, "Invoice number collision, regenerating"),
        }
    }

    Err(AppError::Internal(
        "could not allocate a unique invoice number".into(),
    ))
}

/// Deletes a booking's tickets so its seats become claimable again.
pub(crate) async fn release_tickets(
    conn: &mut PgConnection,
    booking_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM tickets WHERE booking_id = $1")
        .bind(booking_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
