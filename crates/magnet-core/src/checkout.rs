//! Pending Checkout
//!
//! A copy of the about-to-be-placed order, kept only long enough to survive
//! an off-site payment redirect.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, LineItem};

/// Storage key used by client-side vaults
pub const PENDING_ORDER_KEY: &str = "pendingOrder";

/// Snapshot of the order the customer is paying for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub shipping_address_id: String,
    pub user_id: String,
}

impl PendingOrder {
    pub fn cart(&self) -> Cart {
        Cart::new(self.items.clone())
    }
}

/// Opaque handle for a pending checkout record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutToken(String);

impl CheckoutToken {
    /// Generate a new unguessable token
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckoutToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side pending checkout record
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckout {
    pub token: CheckoutToken,
    pub order: PendingOrder,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingCheckout {
    pub fn new(order: PendingOrder, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: CheckoutToken::generate(),
            order,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
