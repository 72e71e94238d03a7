use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::utils::response::error as error_response;

/// Postgres SQLSTATE for `exclusion_violation`.
const PG_EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid seat {seat}: {reason}")]
    InvalidSeat { seat: String, reason: String },

    #[error("Showtime {0} is not bookable")]
    ShowtimeNotBookable(Uuid),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Seat {seat} is already taken")]
    SeatConflict { seat: String },

    #[error("Studio {studio_id} is already occupied during this time slot")]
    ScheduleConflict {
        studio_id: Uuid,
        conflicting_showtime: Option<Uuid>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment provider unavailable: {0}")]
    PaymentUnavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidSeat { .. }
            | AppError::ShowtimeNotBookable(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SeatConflict { .. } | AppError::ScheduleConflict { .. } => {
                StatusCode::CONFLICT
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PaymentUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidSeat { .. } => "INVALID_SEAT",
            AppError::ShowtimeNotBookable(_) => "SHOWTIME_NOT_BOOKABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::SeatConflict { .. } => "SEAT_ALREADY_TAKEN",
            AppError::ScheduleConflict { .. } => "SCHEDULE_CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::PaymentUnavailable(_) => "PAYMENT_UNAVAILABLE",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{resource} with id '{id}' was not found"))
    }

    /// Structured detail a client needs to react, e.g. which seat to re-render.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidSeat { seat, .. } | AppError::SeatConflict { seat } => {
                Some(json!({ "seat": seat }))
            }
            AppError::ScheduleConflict {
                studio_id,
                conflicting_showtime,
            } => Some(json!({
                "studio_id": studio_id,
                "conflicting_showtime_id": conflicting_showtime,
            })),
            AppError::ShowtimeNotBookable(id) => Some(json!({ "showtime_id": id })),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => error!(error = ?e, "Database error"),
            AppError::ExternalService(msg)
            | AppError::PaymentUnavailable(msg)
            | AppError::Internal(msg) => {
                error!(code = self.code(), message = %msg, "Request failed")
            }
            _ => warn!(code = self.code(), error = %self, "Request rejected"),
        }
    }
}

/// True when `err` is a unique violation of the named constraint.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// True when `err` is an exclusion-constraint violation of the named constraint.
pub fn is_exclusion_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(PG_EXCLUSION_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let public_message = match &self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, self.details(), status)
    }
}
