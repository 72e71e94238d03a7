use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::handlers::UserId;
use crate::models::booking::CreateBookingRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn create_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let receipt = state.bookings.create_booking(user_id, &request).await?;
    let message = receipt.message.clone();
    Ok(created(receipt, message))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Response, AppError> {
    let bookings = state.bookings.list_bookings(user_id).await?;
    Ok(success(bookings, "Bookings retrieved successfully"))
}

pub async fn get_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.get_booking(id, user_id).await?;
    Ok(success(booking, "Booking retrieved successfully"))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.cancel(id, user_id).await?;
    Ok(success(booking, "Booking cancelled successfully"))
}

pub async fn retry_payment(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let receipt = state.bookings.retry_payment(id, user_id).await?;
    let message = receipt.message.clone();
    Ok(success(receipt, message))
}
