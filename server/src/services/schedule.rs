//! Studio schedule guard.
//!
//! Showtime slots are half-open `[start, end)`: a screening may begin the instant the previous
//! slot (including its cleanup buffer) ends. The check runs inside the transaction that writes
//! the showtime; the `showtimes_studio_no_overlap` exclusion constraint backs it up.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::utils::error::{is_exclusion_violation, AppError};

pub const SCHEDULE_EXCLUSION_CONSTRAINT: &str = "showtimes_studio_no_overlap";

/// Reference form of the half-open overlap test. `check_overlap` evaluates the same
/// predicate in SQL (`start_time < new_end AND end_time > new_start`).
pub fn intervals_overlap(
    existing_start: DateTime<Utc>,
    existing_end: DateTime<Utc>,
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
) -> bool {
    existing_start < new_end && existing_end > new_start
}

/// Fails with `ScheduleConflict` when a live showtime in `studio_id` intersects `[start, end)`.
/// `exclude` is the showtime being edited, so an unchanged slot never conflicts with itself.
pub async fn check_overlap(
    conn: &mut PgConnection,
    exclude: Option<Uuid>,
    studio_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), AppError> {
    let conflicting: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM showtimes
        WHERE studio_id = $1
          AND deleted_at IS NULL
          -- intervals_overlap(start_time, end_time, $2, $3)
          AND start_time < $3
          AND end_time > $2
          AND ($4::uuid IS NULL OR id <> $4)
        ORDER BY start_time
        LIMIT 1
        "#,
    )
    .bind(studio_id)
    .bind(start)
    .bind(end)
    .bind(exclude)
    .fetch_optional(&mut *conn)
    .await?;

    match conflicting {
        Some(id) => {
            info!(studio_id = %studio_id, conflicting_showtime = %id, "Schedule conflict");
            Err(AppError::ScheduleConflict {
                studio_id,
                conflicting_showtime: Some(id),
            })
        }
        None => Ok(()),
    }
}

/// Translates a write rejected by the exclusion constraint into the same conflict the
/// application check reports.
pub fn map_schedule_violation(err: sqlx::Error, studio_id: Uuid) -> AppError {
    if is_exclusion_violation(&err, SCHEDULE_EXCLUSION_CONSTRAINT) {
        AppError::ScheduleConflict {
            studio_id,
            conflicting_showtime: None,
        }
    } else {
        AppError::Database(err)
    }
}
