//! Payment Error Types

use magnet_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request rejected before anything was charged
    #[error("Validation error: {0}")]
    Validation(String),

    /// No authenticated user
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated user may not touch this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Card declined by the issuer
    #[error("Payment declined: {0}")]
    Declined(String),

    /// Catalog price id unknown to the gateway
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Payment intent unknown to the gateway
    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    /// Stripe API error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain or storage error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Core(CoreError::Storage(_)))
    }

    /// HTTP status code for this error
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::InvalidPrice(_)
            | Self::WebhookSignature(_)
            | Self::WebhookParse(_) => 400,
            Self::Unauthenticated(_) => 401,
            Self::Declined(_) => 402,
            Self::Forbidden(_) => 403,
            Self::IntentNotFound(_) => 404,
            Self::Gateway(_) => 502,
            Self::Config(_) => 503,
            Self::Core(core) => match core {
                CoreError::Validation(_)
                | CoreError::AddressNotFound(_)
                | CoreError::AmountOverflow(_) => 400,
                CoreError::OrderNotFound(_) => 404,
                CoreError::InvalidTransition { .. } => 409,
                CoreError::Storage(_) | CoreError::Json(_) => 500,
            },
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Unauthenticated(_) => "Please sign in to continue.".into(),
            Self::Forbidden(_) => "You don't have access to that.".into(),
            Self::Declined(_) => "Your card was declined. Please try another payment method.".into(),
            Self::InvalidPrice(_) => "One of the items in your cart is no longer available.".into(),
            Self::IntentNotFound(_) => "We couldn't find that payment.".into(),
            Self::Gateway(_) => "Payment processing failed. Please try again.".into(),
            Self::WebhookSignature(_) | Self::WebhookParse(_) => "Invalid webhook.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Core(core) => core.user_message(),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Stripe(request) => {
                let message = request
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{:?}", request.error_type));
                match request.error_type {
                    stripe::ErrorType::Card => Self::Declined(message),
                    stripe::ErrorType::InvalidRequest if request.http_status == 404 => {
                        Self::IntentNotFound(message)
                    }
                    stripe::ErrorType::InvalidRequest => Self::Validation(message),
                    _ => Self::Gateway(message),
                }
            }
            other => Self::Gateway(other.to_string()),
        }
    }
}
