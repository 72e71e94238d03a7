//! Payment callback reconciliation.
//!
//! The provider delivers at least once and in any order. Every transition is a single
//! `UPDATE ... WHERE status = 'PENDING'`, so replays and late notices fall through to a
//! no-op instead of being applied twice, and PAID is never downgraded.

use constant_time_eq::constant_time_eq;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::booking::BookingStatus;
use crate::models::webhook::{CallbackStatus, InvoiceCallback};
use crate::services::booking::release_tickets;
use crate::utils::error::AppError;

/// What a callback did to its booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// PENDING became PAID.
    Paid,
    /// Replay of a payment already recorded.
    AlreadyPaid,
    /// Payment reported for a booking whose seats were already released; left as is.
    PaidAfterRelease,
    /// PENDING became CANCELLED and the seats were released.
    Expired,
    /// Expiry for a booking that was already released.
    AlreadyReleased,
    /// Late expiry for a paid booking.
    ExpiryIgnoredForPaid,
    /// Status this system does not act on.
    Ignored(String),
}

#[derive(Clone)]
pub struct PaymentReconciler {
    pool: PgPool,
    webhook_token: Option<String>,
}

impl PaymentReconciler {
    pub fn new(pool: PgPool, webhook_token: Option<String>) -> Self {
        Self {
            pool,
            webhook_token,
        }
    }

    pub async fn handle_callback(
        &self,
        payload: &InvoiceCallback,
        presented_token: Option<&str>,
    ) -> Result<CallbackOutcome, AppError> {
        self.authenticate(presented_token)?;

        let booking_id = Uuid::parse_str(payload.external_id.trim())
            .map_err(|_| AppError::NotFound(format!("malformed external_id '{}'", payload.external_id)))?;
        let status = self.current_status(booking_id).await?;

        let outcome = match CallbackStatus::parse(&payload.status) {
            CallbackStatus::Paid => self.mark_paid(booking_id, status, &payload.id).await?,
            CallbackStatus::Expired => self.expire(booking_id, status).await?,
            CallbackStatus::Other(reported) => CallbackOutcome::Ignored(reported),
        };

        info!(booking_id = %booking_id, invoice_id = %payload.id, outcome = ?outcome, "Payment callback reconciled");
        Ok(outcome)
    }

    /// Rejects missing, wrong, and unconfigured tokens alike.
    fn authenticate(&self, presented: Option<&str>) -> Result<(), AppError> {
        let expected = self
            .webhook_token
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("webhook token not configured on server".into()))?;
        let presented = presented
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing callback token".into()))?;

        if constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
            Ok(())
        } else {
            Err(AppError::Unauthorized("invalid callback token".into()))
        }
    }

    async fn current_status(&self, booking_id: Uuid) -> Result<BookingStatus, AppError> {
        sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Booking", booking_id))
    }

    async fn mark_paid(
        &self,
        booking_id: Uuid,
        seen: BookingStatus,
        invoice_id: &str,
    ) -> Result<CallbackOutcome, AppError> {
        if seen == BookingStatus::Paid {
            return Ok(CallbackOutcome::AlreadyPaid);
        }

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'PAID', payment_reference = $2, updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(booking_id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            info!(booking_id = %booking_id, "Booking paid");
            return Ok(CallbackOutcome::Paid);
        }

        // Lost a race with another transition; report what won.
        match self.current_status(booking_id).await? {
            BookingStatus::Paid => Ok(CallbackOutcome::AlreadyPaid),
            _ => {
                warn!(booking_id = %booking_id, invoice_id, "Payment received for a released booking");
                Ok(CallbackOutcome::PaidAfterRelease)
            }
        }
    }

    async fn expire(
        &self,
        booking_id: Uuid,
        seen: BookingStatus,
    ) -> Result<CallbackOutcome, AppError> {
        match seen {
            BookingStatus::Paid => return Ok(CallbackOutcome::ExpiryIgnoredForPaid),
            s if s.is_released() => return Ok(CallbackOutcome::AlreadyReleased),
            _ => {}
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(match self.current_status(booking_id).await? {
                BookingStatus::Paid => CallbackOutcome::ExpiryIgnoredForPaid,
                _ => CallbackOutcome::AlreadyReleased,
            });
        }

        let released = release_tickets(&mut tx, booking_id).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, released, "Booking expired, seats released");
        Ok(CallbackOutcome::Expired)
    }
}
