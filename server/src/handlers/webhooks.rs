use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::webhook::InvoiceCallback;
use crate::state::AppState;
use crate::utils::error::AppError;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

#[derive(Serialize)]
struct Acknowledgement {
    status: &'static str,
    message: &'static str,
}

/// Payment provider callback. Always acknowledged with 200 so the provider stops retrying;
/// the reason for a rejection only goes to the logs.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    let result = match serde_json::from_slice::<InvoiceCallback>(&body) {
        Ok(payload) => state.reconciler.handle_callback(&payload, token).await,
        Err(e) => Err(AppError::Validation(format!("unreadable callback body: {e}"))),
    };

    let ack = match result {
        Ok(_) => Acknowledgement {
            status: "success",
            message: "processed",
        },
        Err(e) => {
            match &e {
                AppError::Unauthorized(reason) => warn!(reason = %reason, "Payment callback rejected"),
                AppError::NotFound(reason) | AppError::Validation(reason) => {
                    info!(reason = %reason, "Payment callback not applicable")
                }
                other => error!(error = %other, "Payment callback failed"),
            }
            Acknowledgement {
                status: "error",
                message: "processing error",
            }
        }
    };

    (StatusCode::OK, Json(ack)).into_response()
}
