//! Gateway Webhook Handling
//!
//! Verifies Stripe-style signed events and folds payment outcomes into the
//! matching order. Orders are only ever updated here, never created.
//!
//! ```text
//! raw body + stripe-signature
//!        │
//!        ▼
//! ┌───────────────────┐  bad  ┌──────────┐
//! │ SignatureVerifier │──────▶│   400    │
//! └─────────┬─────────┘       └──────────┘
//!           ▼
//! ┌───────────────────┐       ┌────────────────────────────────┐
//! │   WebhookEvent    │──────▶│ OrderStore::apply_payment_*    │
//! └───────────────────┘       │ OrderStore::upsert_transaction │
//!                             └────────────────────────────────┘
//! ```

use hmac::{Hmac, Mac};
use magnet_core::{IntentStatus, OrderStatus, OrderStore, PaymentOutcome, PaymentTransaction, Transition};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default allowed clock skew between signing and receipt
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Checks `t=<unix>,v1=<hex>` signatures over `"{t}.{body}"`
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verify against the current time
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify as of unix time `now`
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("Missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(PaymentError::WebhookSignature("Missing v1 signature".into()));
        }
        if now.abs_diff(timestamp) > self.tolerance_secs {
            return Err(PaymentError::WebhookSignature(format!(
                "Timestamp {timestamp} outside tolerance"
            )));
        }

        let mac = self.mac(timestamp, payload)?;
        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate).is_ok_and(|sig| mac.clone().verify_slice(&sig).is_ok())
        });
        if matched {
            Ok(())
        } else {
            Err(PaymentError::WebhookSignature("No matching signature".into()))
        }
    }

    /// Header value for `payload` signed at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    /// Verify and decode in one step
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<WebhookEvent> {
        self.verify(payload, header)?;
        WebhookEvent::parse(payload)
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("Webhook secret unusable: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    status: Option<IntentStatus>,
}

#[derive(Deserialize)]
struct RawCharge {
    payment_intent: Option<String>,
    /// `false` while only part of the charge has been refunded
    #[serde(default)]
    refunded: bool,
    #[serde(default)]
    amount_refunded: i64,
}

/// Payment intent fields carried by an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentSnapshot {
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: IntentStatus,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `payment_intent.succeeded`
    IntentSucceeded(IntentSnapshot),
    /// `payment_intent.payment_failed`
    IntentFailed(IntentSnapshot),
    /// `payment_intent.canceled`
    IntentCanceled(IntentSnapshot),
    /// `payment_intent.processing`
    IntentProcessing(IntentSnapshot),
    /// `charge.refunded` for a fully refunded charge
    ChargeRefunded { payment_intent_id: String },
    /// Anything else
    Other { event_type: String },
}

impl WebhookEvent {
    /// Decode a raw event body
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
        tracing::debug!(event_id = %raw.id, event_type = %raw.event_type, "Parsed webhook event");

        let event = match raw.event_type.as_str() {
            "payment_intent.succeeded" => {
                Self::IntentSucceeded(intent(raw.data.object, IntentStatus::Succeeded)?)
            }
            "payment_intent.payment_failed" => Self::IntentFailed(intent(
                raw.data.object,
                IntentStatus::RequiresPaymentMethod,
            )?),
            "payment_intent.canceled" => {
                Self::IntentCanceled(intent(raw.data.object, IntentStatus::Canceled)?)
            }
            "payment_intent.processing" => {
                Self::IntentProcessing(intent(raw.data.object, IntentStatus::Processing)?)
            }
            "charge.refunded" => {
                let charge: RawCharge = serde_json::from_value(raw.data.object)
                    .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
                match charge.payment_intent {
                    Some(payment_intent_id) if charge.refunded => {
                        Self::ChargeRefunded { payment_intent_id }
                    }
                    Some(payment_intent_id) => {
                        tracing::info!(
                            payment_intent_id = %payment_intent_id,
                            amount_refunded = charge.amount_refunded,
                            "Partial refund, order left as is"
                        );
                        Self::Other {
                            event_type: raw.event_type.clone(),
                        }
                    }
                    None => Self::Other {
                        event_type: raw.event_type.clone(),
                    },
                }
            }
            _ => Self::Other {
                event_type: raw.event_type.clone(),
            },
        };
        Ok(event)
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        match self {
            Self::IntentSucceeded(intent)
            | Self::IntentFailed(intent)
            | Self::IntentCanceled(intent)
            | Self::IntentProcessing(intent) => Some(&intent.payment_intent_id),
            Self::ChargeRefunded { payment_intent_id } => Some(payment_intent_id),
            Self::Other { .. } => None,
        }
    }
}

fn intent(object: serde_json::Value, default_status: IntentStatus) -> Result<IntentSnapshot> {
    let raw: RawIntent =
        serde_json::from_value(object).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
    Ok(IntentSnapshot {
        payment_intent_id: raw.id,
        amount_minor: raw.amount,
        currency: raw.currency.to_uppercase(),
        status: raw.status.unwrap_or(default_status),
    })
}

/// What reconciling one event did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Order status moved
    Applied {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// Order already reflected the outcome, or the outcome was stale
    Unchanged { order_id: Uuid },
    /// Event only updated the transaction mirror
    Recorded,
    /// No order exists for the intent
    NoMatchingOrder,
    /// Event type not handled
    Ignored,
}

/// Applies webhook events to orders
pub struct WebhookReconciler {
    orders: Arc<dyn OrderStore>,
}

impl WebhookReconciler {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Process a verified event
    pub async fn handle(&self, event: WebhookEvent) -> Result<ReconcileOutcome> {
        match event {
            WebhookEvent::IntentSucceeded(intent) => {
                self.apply(intent, PaymentOutcome::Succeeded).await
            }
            WebhookEvent::IntentFailed(intent) | WebhookEvent::IntentCanceled(intent) => {
                self.apply(intent, PaymentOutcome::Failed).await
            }
            WebhookEvent::IntentProcessing(intent) => {
                let order_id = self
                    .orders
                    .find_by_payment_intent(&intent.payment_intent_id)
                    .await?
                    .map(|order| order.id);
                self.record(&intent, order_id).await?;
                Ok(ReconcileOutcome::Recorded)
            }
            WebhookEvent::ChargeRefunded { payment_intent_id } => {
                let applied = self
                    .orders
                    .apply_payment_outcome(&payment_intent_id, PaymentOutcome::Refunded)
                    .await?;
                Ok(outcome(&payment_intent_id, applied))
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn apply(&self, intent: IntentSnapshot, payment: PaymentOutcome) -> Result<ReconcileOutcome> {
        let applied = self
            .orders
            .apply_payment_outcome(&intent.payment_intent_id, payment)
            .await?;
        self.record(&intent, applied.as_ref().map(|(order, _)| order.id))
            .await?;
        Ok(outcome(&intent.payment_intent_id, applied))
    }

    async fn record(&self, intent: &IntentSnapshot, order_id: Option<Uuid>) -> Result<()> {
        let mut transaction = PaymentTransaction::new(
            &intent.payment_intent_id,
            intent.status,
            intent.amount_minor,
            &intent.currency,
        );
        if let Some(order_id) = order_id {
            transaction = transaction.with_order(order_id);
        }
        self.orders.upsert_transaction(transaction).await?;
        Ok(())
    }
}

fn outcome(
    payment_intent_id: &str,
    applied: Option<(magnet_core::Order, Transition)>,
) -> ReconcileOutcome {
    match applied {
        None => {
            tracing::info!(payment_intent_id, "No order for payment intent, nothing to update");
            ReconcileOutcome::NoMatchingOrder
        }
        Some((order, Transition::Applied { from, to })) => {
            tracing::info!(
                order_id = %order.id,
                payment_intent_id,
                from = %from,
                to = %to,
                "Order status updated from webhook"
            );
            ReconcileOutcome::Applied {
                order_id: order.id,
                from,
                to,
            }
        }
        Some((order, Transition::Ignored)) => {
            tracing::warn!(
                order_id = %order.id,
                payment_intent_id,
                status = %order.status,
                "Stale payment outcome ignored"
            );
            ReconcileOutcome::Unchanged { order_id: order.id }
        }
        Some((order, Transition::Unchanged)) => ReconcileOutcome::Unchanged { order_id: order.id },
    }
}
