//! Durable Store Contracts
//!
//! Handlers receive these as explicit dependencies. Implement them for the
//! production datastore; the in-memory versions back development and tests.

mod memory;

pub use memory::{MemoryAddressStore, MemoryOrderStore, MemoryPendingCheckoutStore};

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::address::Address;
use crate::checkout::{CheckoutToken, PendingCheckout, PendingOrder};
use crate::error::Result;
use crate::order::{NewOrder, Order, OrderItem, OrderStatus, PaymentOutcome, PaymentTransaction, Transition};

/// Result of inserting an order
#[derive(Clone, Debug)]
pub enum Insertion {
    /// A new order and its items were written
    Created(Order),
    /// An order for the same payment intent already existed; nothing was written
    Existing(Order),
}

impl Insertion {
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::Existing(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::Existing(order) => order,
        }
    }

    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Orders, order items and payment transactions
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write an order and all of its items as one unit.
    ///
    /// At most one order exists per payment intent id.
    async fn insert_order(&self, order: NewOrder) -> Result<Insertion>;

    /// Get order by id
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// Get order by gateway payment intent id
    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>>;

    /// Items belonging to an order
    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;

    /// A customer's orders, newest first
    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>>;

    /// Atomically fold a payment outcome into the order for this intent
    async fn apply_payment_outcome(
        &self,
        payment_intent_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<Option<(Order, Transition)>>;

    /// Manual status change
    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(Order, Transition)>;

    /// Save or update the transaction mirror for an intent
    async fn upsert_transaction(&self, transaction: PaymentTransaction) -> Result<PaymentTransaction>;

    /// Transaction mirror for an intent
    async fn transaction_for_intent(&self, payment_intent_id: &str) -> Result<Option<PaymentTransaction>>;
}

/// Customer address book
#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn add_address(&self, address: Address) -> Result<Address>;

    async fn get_address(&self, id: &str) -> Result<Option<Address>>;

    async fn addresses_for_user(&self, user_id: &str) -> Result<Vec<Address>>;
}

/// Short-lived pending checkouts carried across payment redirects
#[async_trait]
pub trait PendingCheckoutStore: Send + Sync {
    /// Save a snapshot and hand back its token
    async fn put(&self, order: PendingOrder, ttl: Duration) -> Result<PendingCheckout>;

    /// Read without consuming; expired records are never returned
    async fn get(&self, token: &CheckoutToken) -> Result<Option<PendingCheckout>>;

    /// Read and remove
    async fn take(&self, token: &CheckoutToken) -> Result<Option<PendingCheckout>>;

    /// Drop expired records, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}
