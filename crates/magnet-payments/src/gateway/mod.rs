//! Payment Gateway Integration
//!
//! The gateway owns the payment intent lifecycle. This crate only creates,
//! confirms and reads intents through the `PaymentGateway` trait.

mod mock;
mod stripe_gateway;

pub use mock::{MockGateway, TEST_CARD_DECLINED, TEST_CARD_REQUIRES_ACTION, TEST_CARD_SUCCEEDS};
pub use stripe_gateway::StripeGateway;

use async_trait::async_trait;
use magnet_core::IntentStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Metadata key carrying the authenticated user id
pub const USER_ID_METADATA_KEY: &str = "user_id";

/// Gateway-side payment intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Off-site authentication page, set when `status` is `requires_action`
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl PaymentIntent {
    /// User the intent was opened for
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get(USER_ID_METADATA_KEY).map(String::as_str)
    }
}

/// Parameters for opening an intent
#[derive(Clone, Debug)]
pub struct CreateIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

/// Parameters for confirming an intent
#[derive(Clone, Debug)]
pub struct ConfirmIntent {
    pub payment_method: String,
    /// Where the gateway sends the customer back after off-site authentication
    pub return_url: String,
}

/// Payment gateway trait (Strategy pattern)
///
/// Implement this for each processor; the checkout services never talk to a
/// vendor SDK directly.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Unit amount in minor units for a catalog price id, `None` if unknown
    async fn catalog_unit_amount(&self, price_ref: &str) -> Result<Option<i64>>;

    /// Open a new intent
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent>;

    /// Read an intent's current state
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent>;

    /// Confirm an intent with a payment method
    async fn confirm_intent(&self, intent_id: &str, request: ConfirmIntent) -> Result<PaymentIntent>;

    /// Gateway name
    fn name(&self) -> &str;
}
