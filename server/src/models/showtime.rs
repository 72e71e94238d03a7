use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Cleaning and preparation time reserved after every screening.
pub const CLEANUP_BUFFER_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub studio_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Snapshot of start + movie duration + buffer; not recomputed if the movie changes later.
    pub end_time: DateTime<Utc>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// End of the studio slot occupied by a screening starting at `start`.
pub fn slot_end(start: DateTime<Utc>, duration_minutes: i32) -> DateTime<Utc> {
    start + Duration::minutes(i64::from(duration_minutes) + CLEANUP_BUFFER_MINUTES)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowtimeInput {
    pub movie_id: Uuid,
    pub studio_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub price: Decimal,
}

impl ShowtimeInput {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.movie_id.is_nil() {
            return Err(AppError::Validation("movie_id is required".into()));
        }
        if self.studio_id.is_nil() {
            return Err(AppError::Validation("studio_id is required".into()));
        }
        if self.start_time <= now {
            return Err(AppError::Validation(
                "start_time must be in the future".into(),
            ));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation("price must be greater than 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowtimeFilter {
    pub movie_id: Option<Uuid>,
    /// UTC calendar day the screening starts on.
    pub date: Option<NaiveDate>,
}

/// Showtime joined with the names clients display next to it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShowtimeListing {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub studio_id: Uuid,
    pub studio_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccupiedSeats {
    pub showtime_id: Uuid,
    pub occupied_seats: Vec<String>,
    pub total_occupied: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slot_end_adds_duration_and_buffer() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        let end = slot_end(start, 120);
        assert_eq!(end, Utc.with_ymd_and_hms(2030, 1, 1, 12, 15, 0).unwrap());
    }

    #[test]
    fn test_showtime_input_validation() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let valid = ShowtimeInput {
            movie_id: Uuid::new_v4(),
            studio_id: Uuid::new_v4(),
            start_time: now + Duration::hours(1),
            price: Decimal::new(5000000, 2),
        };
        assert!(valid.validate(now).is_ok());

        let past = ShowtimeInput {
            start_time: now - Duration::minutes(1),
            ..valid.clone()
        };
        assert!(matches!(past.validate(now), Err(AppError::Validation(_))));

        let free = ShowtimeInput {
            price: Decimal::ZERO,
            ..valid.clone()
        };
        assert!(matches!(free.validate(now), Err(AppError::Validation(_))));

        let no_movie = ShowtimeInput {
            movie_id: Uuid::nil(),
            ..valid
        };
        assert!(matches!(no_movie.validate(now), Err(AppError::Validation(_))));
    }
}
