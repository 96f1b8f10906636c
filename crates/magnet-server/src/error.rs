//! HTTP Error Responses

use axum::{http::StatusCode, Json};
use magnet_core::CoreError;
use magnet_payments::PaymentError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<T, ApiError>;

pub fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

const fn error_code(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::Validation(_) | PaymentError::InvalidPrice(_) => "VALIDATION_ERROR",
        PaymentError::Unauthenticated(_) => "UNAUTHENTICATED",
        PaymentError::Forbidden(_) => "FORBIDDEN",
        PaymentError::Declined(_) => "PAYMENT_DECLINED",
        PaymentError::IntentNotFound(_) => "NOT_FOUND",
        PaymentError::Gateway(_) => "GATEWAY_ERROR",
        PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
        PaymentError::WebhookParse(_) => "INVALID_EVENT",
        PaymentError::Config(_) => "PAYMENTS_DISABLED",
        PaymentError::Core(core) => match core {
            CoreError::Validation(_) | CoreError::AddressNotFound(_) | CoreError::AmountOverflow(_) => {
                "VALIDATION_ERROR"
            }
            CoreError::OrderNotFound(_) => "NOT_FOUND",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::Storage(_) | CoreError::Json(_) => "PERSISTENCE_ERROR",
        },
    }
}

/// Map a payment-side error to its response, logging server faults
pub fn api_error(err: impl Into<PaymentError>) -> ApiError {
    let err = err.into();
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "Request failed");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "Request rejected");
    }

    error_response(status, err.user_message(), error_code(&err))
}
