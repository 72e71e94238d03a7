//! Seat allocation.
//!
//! A seat label is a row letter followed by a 1-based column number (`A5`). Requests are
//! normalized against the studio grid, deduplicated, and claimed by inserting one ticket row
//! per seat. The `tickets_showtime_seat_unique` constraint is the only thing that decides who
//! wins a race for a seat; the availability pre-check exists to fail fast, not for safety.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::booking::Ticket;
use crate::models::studio::MAX_GRID_DIMENSION;
use crate::utils::error::{is_unique_violation, AppError};

pub const SEAT_UNIQUE_CONSTRAINT: &str = "tickets_showtime_seat_unique";

/// Studio seat geometry: `rows` letters starting at `A`, `cols` numbers starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatGrid {
    rows: u8,
    cols: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeatLabel {
    row: u8,
    col: u8,
}

impl fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(b'A' + self.row), self.col)
    }
}

impl SeatGrid {
    pub fn new(total_rows: i32, total_cols: i32) -> Result<Self, AppError> {
        let check = |value: i32, what: &str| {
            u8::try_from(value)
                .ok()
                .filter(|v| (1..=MAX_GRID_DIMENSION).contains(&i32::from(*v)))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "total {what} must be between 1 and {MAX_GRID_DIMENSION}"
                    ))
                })
        };

        Ok(Self {
            rows: check(total_rows, "rows")?,
            cols: check(total_cols, "columns")?,
        })
    }

    /// Parses one requested label: trimmed, case-insensitive, canonical column (`a05` is `A5`).
    pub fn parse(&self, raw: &str) -> Result<SeatLabel, AppError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let invalid = |reason: String| AppError::InvalidSeat {
            seat: normalized.clone(),
            reason,
        };

        let mut chars = normalized.chars();
        let row_letter = match chars.next() {
            Some(c @ 'A'..='Z') => c,
            _ => return Err(invalid("seat must start with a row letter".into())),
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("seat column must be a number".into()));
        }

        let row = row_letter as u8 - b'A';
        if row >= self.rows {
            return Err(invalid(format!(
                "row {row_letter} is outside this studio (last row {})",
                char::from(b'A' + self.rows - 1)
            )));
        }

        let col = digits
            .parse::<u32>()
            .ok()
            .filter(|c| (1..=u32::from(self.cols)).contains(c))
            .ok_or_else(|| invalid(format!("column must be between 1 and {}", self.cols)))?;

        Ok(SeatLabel {
            row,
            col: col as u8,
        })
    }

    /// Validates every label and collapses repeats. The result is sorted row-major so that
    /// concurrent claimers always insert in the same order and cannot deadlock each other.
    pub fn normalize_request(&self, requested: &[String]) -> Result<Vec<SeatLabel>, AppError> {
        if requested.is_empty() {
            return Err(AppError::Validation(
                "at least one seat must be selected".into(),
            ));
        }

        let unique = requested
            .iter()
            .map(|raw| self.parse(raw))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(unique.into_iter().collect())
    }

    /// Every seat label, one inner vector per row.
    pub fn layout(&self) -> Vec<Vec<String>> {
        (0..self.rows)
            .map(|row| {
                (1..=self.cols)
                    .map(|col| SeatLabel { row, col }.to_string())
                    .collect()
            })
            .collect()
    }
}

/// Showtime facts the allocator needs, read in the claiming transaction.
#[derive(Debug, Clone, FromRow)]
pub struct BookableShowtime {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub price: Decimal,
    pub total_rows: i32,
    pub total_cols: i32,
}

impl BookableShowtime {
    pub fn grid(&self) -> Result<SeatGrid, AppError> {
        SeatGrid::new(self.total_rows, self.total_cols)
    }
}

/// Loads a live showtime with its studio geometry. Missing, deleted, and already started
/// showtimes are all `ShowtimeNotBookable`, as are showtimes whose studio or movie was deleted.
/// The studio row stays share-locked until the claim commits, so its geometry cannot change
/// underneath the claim.
pub async fn load_bookable_showtime(
    conn: &mut PgConnection,
    showtime_id: Uuid,
    now: DateTime<Utc>,
) -> Result<BookableShowtime, AppError> {
    let showtime = sqlx::query_as::<_, BookableShowtime>(
        r#"
        SELECT s.id, s.start_time, s.price, st.total_rows, st.total_cols
        FROM showtimes s
        JOIN studios st ON st.id = s.studio_id
        JOIN movies m ON m.id = s.movie_id
        WHERE s.id = $1
          AND s.deleted_at IS NULL
          AND st.deleted_at IS NULL
          AND m.deleted_at IS NULL
        FOR SHARE OF s, st
        "#,
    )
    .bind(showtime_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::ShowtimeNotBookable(showtime_id))?;

    if showtime.start_time <= now {
        debug!(showtime_id = %showtime_id, "Rejecting booking for a started showtime");
        return Err(AppError::ShowtimeNotBookable(showtime_id));
    }

    Ok(showtime)
}

/// Fast-path availability check. A seat free here can still be lost to a concurrent
/// claimer; `claim_seats` settles that.
pub async fn reject_taken_seats(
    conn: &mut PgConnection,
    showtime_id: Uuid,
    seats: &[SeatLabel],
) -> Result<(), AppError> {
    let labels: Vec<String> = seats.iter().map(ToString::to_string).collect();
    let taken: Option<String> = sqlx::query_scalar(
        r#"
        SELECT seat_label FROM tickets
        WHERE showtime_id = $1 AND seat_label = ANY($2)
        ORDER BY substring(seat_label, 1, 1), substring(seat_label, 2)::int
        LIMIT 1
        "#,
    )
    .bind(showtime_id)
    .bind(&labels)
    .fetch_optional(&mut *conn)
    .await?;

    match taken {
        Some(seat) => Err(AppError::SeatConflict { seat }),
        None => Ok(()),
    }
}

/// Inserts one ticket per seat inside the caller's transaction. The first seat rejected by
/// the uniqueness constraint aborts the claim; the caller must then roll back so that no
/// seat from this attempt survives.
pub async fn claim_seats(
    conn: &mut PgConnection,
    booking_id: Uuid,
    showtime_id: Uuid,
    seats: &[SeatLabel],
) -> Result<Vec<Ticket>, AppError> {
    let mut tickets = Vec::with_capacity(seats.len());

    for seat in seats {
        let label = seat.to_string();
        let inserted = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, booking_id, showtime_id, seat_label)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(showtime_id)
        .bind(&label)
        .fetch_one(&mut *conn)
        .await;

        match inserted {
            Ok(ticket) => tickets.push(ticket),
            Err(e) if is_unique_violation(&e, SEAT_UNIQUE_CONSTRAINT) => {
                info!(showtime_id = %showtime_id, seat = %label, "Seat lost to a concurrent booking");
                return Err(AppError::SeatConflict { seat: label });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(seats: &[SeatLabel]) -> Vec<String> {
        seats.iter().map(ToString::to_string).collect()
    }

    fn request(seats: &[&str]) -> Vec<String> {
        seats.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ten_by_eight_studio_bounds() {
        let grid = SeatGrid::new(10, 8).unwrap();

        assert_eq!(grid.parse("J8").unwrap().to_string(), "J8");
        assert_eq!(grid.parse("A1").unwrap().to_string(), "A1");

        let row_out = grid.parse("K1").unwrap_err();
        assert!(matches!(row_out, AppError::InvalidSeat { ref seat, .. } if seat == "K1"));

        let col_out = grid.parse("A9").unwrap_err();
        assert!(matches!(col_out, AppError::InvalidSeat { ref seat, .. } if seat == "A9"));
    }

    #[test]
    fn test_parse_normalizes_case_whitespace_and_leading_zeros() {
        let grid = SeatGrid::new(5, 10).unwrap();
        assert_eq!(grid.parse("  b3 ").unwrap().to_string(), "B3");
        assert_eq!(grid.parse("c07").unwrap().to_string(), "C7");
        assert_eq!(grid.parse("A10").unwrap().to_string(), "A10");
    }

    #[test]
    fn test_parse_rejects_malformed_labels() {
        let grid = SeatGrid::new(5, 10).unwrap();
        for raw in ["", "A", "5A", "A0", "A-1", "A+1", "AA1", "1", "Ä1", "A99999999999"] {
            assert!(
                matches!(grid.parse(raw), Err(AppError::InvalidSeat { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicates_collapse_and_order_is_row_major() {
        let grid = SeatGrid::new(10, 8).unwrap();
        let seats = grid
            .normalize_request(&request(&["A6", "a5", "A5", " A5", "B1", "A6"]))
            .unwrap();
        assert_eq!(labels(&seats), vec!["A5", "A6", "B1"]);
    }

    #[test]
    fn test_one_invalid_label_fails_the_whole_request() {
        let grid = SeatGrid::new(10, 8).unwrap();
        let err = grid
            .normalize_request(&request(&["A1", "A9", "B2"]))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSeat { ref seat, .. } if seat == "A9"));
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let grid = SeatGrid::new(10, 8).unwrap();
        assert!(matches!(
            grid.normalize_request(&[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_grid_dimensions_are_bounded() {
        assert!(SeatGrid::new(1, 1).is_ok());
        assert!(SeatGrid::new(20, 20).is_ok());
        assert!(SeatGrid::new(0, 5).is_err());
        assert!(SeatGrid::new(21, 5).is_err());
        assert!(SeatGrid::new(5, -1).is_err());
    }

    #[test]
    fn test_layout_is_row_major() {
        let layout = SeatGrid::new(2, 3).unwrap().layout();
        assert_eq!(
            layout,
            vec![vec!["A1", "A2", "A3"], vec!["B1", "B2", "B3"]]
        );
    }
}
