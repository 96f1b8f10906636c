//! Order Finalizer
//!
//! Turns a paid payment intent plus the pending order snapshot into a
//! durable order. May be called twice for one checkout (inline success and
//! post-redirect return); the gateway intent id is the idempotency key, so
//! the second call gets the existing order back.

use magnet_core::{
    money, AddressStore, IntentStatus, NewOrder, NewOrderItem, OrderStatus, OrderStore,
    PaymentOutcome, PaymentStatus, PaymentTransaction, PendingOrder,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::issuer::quote_cart;

/// Input for creating an order
#[derive(Clone, Debug)]
pub struct FinalizeRequest {
    pub order: PendingOrder,
    pub payment_intent_id: String,
}

/// Created (or previously created) order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedOrder {
    pub order_id: Uuid,
    /// `false` when an order for this intent already existed
    pub created: bool,
    pub status: OrderStatus,
}

/// Creates orders for paid intents
pub struct OrderFinalizer {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    addresses: Arc<dyn AddressStore>,
}

impl OrderFinalizer {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        addresses: Arc<dyn AddressStore>,
    ) -> Self {
        Self {
            gateway,
            orders,
            addresses,
        }
    }

    /// Create the order for `request` on behalf of `session_user`
    pub async fn finalize(&self, request: FinalizeRequest, session_user: &str) -> Result<FinalizedOrder> {
        let FinalizeRequest {
            order: snapshot,
            payment_intent_id,
        } = request;

        if session_user.is_empty() {
            return Err(PaymentError::Unauthenticated("Sign in to place an order".into()));
        }
        if snapshot.user_id != session_user {
            return Err(PaymentError::Forbidden(
                "Order user does not match the signed-in user".into(),
            ));
        }
        if payment_intent_id.trim().is_empty() {
            return Err(PaymentError::Validation("Missing payment intent id.".into()));
        }

        // A repeat call must not depend on gateway or address lookups succeeding again.
        if let Some(existing) = self.orders.find_by_payment_intent(&payment_intent_id).await? {
            if !existing.belongs_to(session_user) {
                return Err(PaymentError::Forbidden("Payment belongs to another user".into()));
            }
            tracing::info!(order_id = %existing.id, payment_intent_id = %payment_intent_id, "Order already finalized");
            return Ok(FinalizedOrder {
                order_id: existing.id,
                created: false,
                status: existing.status,
            });
        }

        let cart = snapshot.cart();
        cart.validate()?;
        self.check_address(&snapshot.shipping_address_id, session_user).await?;

        let intent = self.gateway.retrieve_intent(&payment_intent_id).await?;
        if intent.user_id().is_some_and(|owner| owner != session_user) {
            return Err(PaymentError::Forbidden("Payment belongs to another user".into()));
        }
        let (status, payment_status) = match intent.status {
            IntentStatus::Succeeded => (OrderStatus::Processing, PaymentStatus::Succeeded),
            s if s.is_settling() => (OrderStatus::PendingPayment, PaymentStatus::Pending),
            other => {
                return Err(PaymentError::Validation(format!(
                    "Payment has not completed (status: {other})."
                )));
            }
        };

        let expected_minor = money::to_minor_units(snapshot.total, &intent.currency)?;
        if expected_minor != intent.amount_minor {
            tracing::warn!(
                payment_intent_id = %payment_intent_id,
                expected = expected_minor,
                charged = intent.amount_minor,
                "Order total does not match charged amount"
            );
            return Err(PaymentError::Validation(
                "Order total does not match the amount paid.".into(),
            ));
        }

        // Same line prices the intent was issued with, catalog lines included.
        let quote = quote_cart(self.gateway.as_ref(), &cart, &intent.currency).await?;
        let subtotal = quote.total;
        if snapshot.total < subtotal {
            return Err(PaymentError::Validation(
                "Order total is less than the item subtotal.".into(),
            ));
        }

        let items = snapshot
            .items
            .iter()
            .zip(&quote.lines)
            .map(|(item, line)| NewOrderItem {
                product_ref: item.product_ref.clone(),
                quantity: item.quantity,
                price_per_unit: line.unit_price,
                image_url: item.image_ref.clone(),
                size: item.size.clone(),
            })
            .collect();

        let insertion = self
            .orders
            .insert_order(NewOrder {
                user_id: session_user.to_string(),
                status,
                payment_status,
                shipping_address_id: snapshot.shipping_address_id.clone(),
                subtotal,
                shipping_cost: snapshot.total - subtotal,
                tax: Decimal::ZERO,
                total: snapshot.total,
                currency: intent.currency.clone(),
                payment_intent_id: payment_intent_id.clone(),
                items,
            })
            .await?;

        let mut order = insertion.order().clone();
        let mut mirrored_status = intent.status;

        // The success webhook may have landed between the intent read and the
        // insert, when no order existed for it to update.
        if insertion.was_created() && order.status == OrderStatus::PendingPayment {
            let settled = self
                .orders
                .transaction_for_intent(&payment_intent_id)
                .await?
                .is_some_and(|tx| tx.status == IntentStatus::Succeeded);
            if settled {
                if let Some((updated, _)) = self
                    .orders
                    .apply_payment_outcome(&payment_intent_id, PaymentOutcome::Succeeded)
                    .await?
                {
                    tracing::info!(order_id = %updated.id, payment_intent_id = %payment_intent_id, "Payment settled before order was written");
                    order = updated;
                }
                mirrored_status = IntentStatus::Succeeded;
            }
        }

        self.orders
            .upsert_transaction(
                PaymentTransaction::new(
                    &payment_intent_id,
                    mirrored_status,
                    intent.amount_minor,
                    &intent.currency,
                )
                .with_order(order.id),
            )
            .await?;

        if insertion.was_created() {
            tracing::info!(
                order_id = %order.id,
                payment_intent_id = %payment_intent_id,
                user_id = session_user,
                total = %order.total,
                status = %order.status,
                "Created order"
            );
        } else {
            tracing::info!(order_id = %order.id, payment_intent_id = %payment_intent_id, "Concurrent finalize returned existing order");
        }

        Ok(FinalizedOrder {
            order_id: order.id,
            created: insertion.was_created(),
            status: order.status,
        })
    }

    async fn check_address(&self, address_id: &str, user_id: &str) -> Result<()> {
        if address_id.trim().is_empty() {
            return Err(PaymentError::Validation("Please select a shipping address.".into()));
        }
        match self.addresses.get_address(address_id).await? {
            Some(address) if address.user_id == user_id => Ok(()),
            Some(_) => Err(PaymentError::Forbidden("Address belongs to another user".into())),
            None => Err(magnet_core::CoreError::AddressNotFound(address_id.to_string()).into()),
        }
    }
}
