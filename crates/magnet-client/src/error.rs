//! Client Error Types
//!
//! Every failure the customer can see falls into one of four kinds, each
//! with its own message. None of them are retried automatically.

use magnet_payments::PaymentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClientError {
    /// Checkout submitted without a shipping address
    #[error("No shipping address selected")]
    MissingAddress,

    /// Request rejected as invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// Card declined or authentication failed
    #[error("Payment declined: {0}")]
    Declined(String),

    /// Anything else
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ClientError {
    /// Message shown on the checkout page
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingAddress => "Please select a shipping address.".into(),
            Self::Validation(msg) => msg.clone(),
            Self::Declined(_) => {
                "Your payment was declined. Please try another payment method.".into()
            }
            Self::Unexpected(_) => "An unexpected error occurred. Please try again.".into(),
        }
    }

    /// Map an HTTP error response from the checkout server
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::Validation(message),
            402 => Self::Declined(message),
            _ => Self::Unexpected(format!("HTTP {status}: {message}")),
        }
    }
}

impl From<PaymentError> for ClientError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(msg) => Self::Declined(msg),
            other if other.status_code() == 400 => Self::Validation(other.user_message()),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unexpected(err.to_string())
    }
}
