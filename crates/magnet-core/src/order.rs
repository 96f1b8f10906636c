//! Orders and Payment State
//!
//! ```text
//! pending_payment ──▶ processing ──▶ shipped ──▶ delivered
//!        │                 │            │            │
//!        ▼                 ├──▶ cancelled            │
//!    cancelled             └──▶ refunded ◀───────────┘
//! ```
//!
//! Transitions into `processing` and `cancelled` may be driven by both the
//! order finalizer and the webhook reconciler, in either order and more than
//! once. Every transition here is therefore idempotent.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Fulfilment state of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether `next` is reachable in one step
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingPayment, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled | Self::Refunded)
                | (Self::Shipped, Self::Delivered | Self::Refunded)
                | (Self::Delivered, Self::Refunded)
        )
    }

    /// Payment has been collected for this order
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Processing | Self::Shipped | Self::Delivered)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending_payment" => Ok(Self::PendingPayment),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(CoreError::Validation(format!("Unknown order status: {other}"))),
        }
    }
}

/// Payment state mirrored from the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

/// Gateway payment intent lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl IntentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
        }
    }

    /// Intent may still turn into a successful charge without customer input
    pub const fn is_settling(&self) -> bool {
        matches!(self, Self::Processing | Self::RequiresCapture)
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gateway reported about an order's payment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Refunded,
}

/// Effect of applying a status change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Order moved from one status to another
    Applied { from: OrderStatus, to: OrderStatus },
    /// Target state already held
    Unchanged,
    /// Outcome is stale for the current state and was dropped
    Ignored,
}

impl Transition {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Durable order record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address_id: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Move to `next` if the edge is allowed
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<Transition> {
        if self.status == next {
            return Ok(Transition::Unchanged);
        }
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let from = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        if next == OrderStatus::Refunded {
            self.payment_status = PaymentStatus::Refunded;
        }
        Ok(Transition::Applied { from, to: next })
    }

    /// Fold a gateway payment outcome into the order
    pub fn apply_payment_outcome(&mut self, outcome: PaymentOutcome) -> Transition {
        let from = self.status;
        let (status, payment_status) = match outcome {
            PaymentOutcome::Succeeded => {
                if from != OrderStatus::PendingPayment {
                    return Transition::Unchanged;
                }
                (OrderStatus::Processing, PaymentStatus::Succeeded)
            }
            PaymentOutcome::Failed => match from {
                OrderStatus::PendingPayment => (OrderStatus::Cancelled, PaymentStatus::Failed),
                OrderStatus::Cancelled => return Transition::Unchanged,
                _ => return Transition::Ignored,
            },
            PaymentOutcome::Refunded => match from {
                OrderStatus::Refunded => return Transition::Unchanged,
                s if s.is_paid() => (OrderStatus::Refunded, PaymentStatus::Refunded),
                _ => return Transition::Ignored,
            },
        };

        self.status = status;
        self.payment_status = payment_status;
        self.updated_at = Utc::now();
        Transition::Applied { from, to: status }
    }

    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Durable order line, immutable once written
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_ref: String,
    pub quantity: u32,
    pub price_per_unit: Decimal,
    pub image_url: Option<String>,
    pub size: Option<String>,
}

/// Order and items about to be written as one unit
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address_id: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub payment_intent_id: String,
    pub items: Vec<NewOrderItem>,
}

#[derive(Clone, Debug)]
pub struct NewOrderItem {
    pub product_ref: String,
    pub quantity: u32,
    pub price_per_unit: Decimal,
    pub image_url: Option<String>,
    pub size: Option<String>,
}

impl NewOrder {
    /// Materialize the order and its items with a fresh id
    pub fn into_records(self) -> (Order, Vec<OrderItem>) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let items = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                order_id: id,
                product_ref: item.product_ref,
                quantity: item.quantity,
                price_per_unit: item.price_per_unit,
                image_url: item.image_url,
                size: item.size,
            })
            .collect();

        let order = Order {
            id,
            user_id: self.user_id,
            status: self.status,
            payment_status: self.payment_status,
            shipping_address_id: self.shipping_address_id,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax: self.tax,
            total: self.total,
            currency: self.currency,
            payment_intent_id: self.payment_intent_id,
            created_at: now,
            updated_at: now,
        };
        (order, items)
    }
}

/// Audit mirror of a gateway intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub payment_intent_id: String,
    pub status: IntentStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn new(
        payment_intent_id: impl Into<String>,
        status: IntentStatus,
        amount_minor: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: None,
            payment_intent_id: payment_intent_id.into(),
            status,
            amount_minor,
            currency: currency.into(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending_order() -> Order {
        let (order, _) = NewOrder {
            user_id: "user_1".into(),
            status: OrderStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            shipping_address_id: "addr_1".into(),
            subtotal: dec!(19.98),
            shipping_cost: dec!(0),
            tax: dec!(0),
            total: dec!(19.98),
            currency: "GBP".into(),
            payment_intent_id: "pi_1".into(),
            items: Vec::new(),
        }
        .into_records();
        order
    }

    #[test]
    fn test_transition_edges() {
        use OrderStatus::*;
        assert!(PendingPayment.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Shipped.can_transition_to(PendingPayment));
        assert!(!PendingPayment.can_transition_to(Shipped));
    }

    #[test]
    fn test_transition_same_state_is_noop() {
        let mut order = pending_order();
        assert_eq!(
            order.transition_to(OrderStatus::PendingPayment).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut order = pending_order();
        let err = order.transition_to(OrderStatus::Delivered).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(order.status, OrderStatus::PendingPayment);
    }

    #[test]
    fn test_success_applied_once() {
        let mut order = pending_order();
        assert!(order.apply_payment_outcome(PaymentOutcome::Succeeded).is_applied());
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Succeeded);

        assert_eq!(
            order.apply_payment_outcome(PaymentOutcome::Succeeded),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_success_does_not_regress_shipped_order() {
        let mut order = pending_order();
        order.apply_payment_outcome(PaymentOutcome::Succeeded);
        order.transition_to(OrderStatus::Shipped).unwrap();

        assert_eq!(
            order.apply_payment_outcome(PaymentOutcome::Succeeded),
            Transition::Unchanged
        );
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_failure_cancels_pending_order() {
        let mut order = pending_order();
        assert!(order.apply_payment_outcome(PaymentOutcome::Failed).is_applied());
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(
            order.apply_payment_outcome(PaymentOutcome::Failed),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_stale_failure_after_success_ignored() {
        let mut order = pending_order();
        order.apply_payment_outcome(PaymentOutcome::Succeeded);
        assert_eq!(
            order.apply_payment_outcome(PaymentOutcome::Failed),
            Transition::Ignored
        );
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn test_refund_only_for_paid_orders() {
        let mut order = pending_order();
        assert_eq!(
            order.apply_payment_outcome(PaymentOutcome::Refunded),
            Transition::Ignored
        );

        order.apply_payment_outcome(PaymentOutcome::Succeeded);
        assert!(order.apply_payment_outcome(PaymentOutcome::Refunded).is_applied());
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
