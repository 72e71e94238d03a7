use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    /// Readable for reporting but never written: provider expiry resolves to `Cancelled`.
    Expired,
}

impl BookingStatus {
    /// Seats of a released booking have been deleted and can be claimed again.
    pub fn is_released(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    /// Provider invoice id; a cache of provider state, not authoritative.
    pub payment_reference: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub showtime_id: Uuid,
    pub seat_label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingWithTickets {
    #[serde(flatten)]
    pub booking: Booking,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub showtime_id: Uuid,
    #[serde(alias = "seat_numbers")]
    pub seat_labels: Vec<String>,
}

/// What the customer gets back from booking creation or a payment retry.
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: BookingWithTickets,
    pub payment_url: Option<String>,
    pub message: String,
}
