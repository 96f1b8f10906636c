//! Error Types

use thiserror::Error;
use uuid::Uuid;

use crate::order::OrderStatus;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Domain and storage errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input rejected before any state changed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    /// Address not found
    #[error("Address not found: {0}")]
    AddressNotFound(String),

    /// Order status edge not allowed
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Amount does not fit into minor units
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the caller can fix the request and try again
    pub const fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AddressNotFound(_) | Self::InvalidTransition { .. }
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::OrderNotFound(_) => "We couldn't find that order.".into(),
            Self::AddressNotFound(_) => "Please choose a valid shipping address.".into(),
            Self::InvalidTransition { from, to } => {
                format!("An order that is {from} cannot be marked {to}.")
            }
            _ => "An error occurred processing your order.".into(),
        }
    }
}
