//! Mock Payment Gateway
//!
//! For testing and local development. Keeps intents in memory and decides
//! confirmation outcomes from the same test payment method ids Stripe uses.

use async_trait::async_trait;
use magnet_core::IntentStatus;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConfirmIntent, CreateIntent, PaymentGateway, PaymentIntent};
use crate::error::{PaymentError, Result};

/// Card that succeeds without further action
pub const TEST_CARD_SUCCEEDS: &str = "pm_card_visa";

/// Card that requires off-site 3-D Secure authentication
pub const TEST_CARD_REQUIRES_ACTION: &str = "pm_card_threeDSecure2Required";

/// Card declined by the issuer
pub const TEST_CARD_DECLINED: &str = "pm_card_chargeDeclined";

/// Mock gateway with an in-memory catalog and intent table
#[derive(Default)]
pub struct MockGateway {
    catalog: RwLock<HashMap<String, i64>>,
    intents: RwLock<HashMap<String, PaymentIntent>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog price (unit amount in minor units)
    #[must_use]
    pub fn with_price(mut self, price_ref: impl Into<String>, unit_amount: i64) -> Self {
        self.catalog.get_mut().insert(price_ref.into(), unit_amount);
        self
    }

    /// Register a catalog price from async code
    pub async fn add_price(&self, price_ref: impl Into<String>, unit_amount: i64) {
        self.catalog.write().await.insert(price_ref.into(), unit_amount);
    }

    /// Number of intents opened so far
    pub async fn intent_count(&self) -> usize {
        self.intents.read().await.len()
    }

    /// Customer finished (or abandoned) step-up authentication
    pub async fn complete_authentication(&self, intent_id: &str, approved: bool) -> Result<PaymentIntent> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;

        if intent.status != IntentStatus::RequiresAction {
            return Err(PaymentError::Validation(format!(
                "Intent {intent_id} is {} and not awaiting authentication",
                intent.status
            )));
        }
        intent.status = if approved {
            IntentStatus::Succeeded
        } else {
            IntentStatus::RequiresPaymentMethod
        };
        intent.redirect_url = None;
        Ok(intent.clone())
    }

    /// Force an intent into a status (e.g. simulate async settlement)
    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<()> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;
        intent.status = status;
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn catalog_unit_amount(&self, price_ref: &str) -> Result<Option<i64>> {
        Ok(self.catalog.read().await.get(price_ref).copied())
    }

    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent> {
        if request.amount_minor <= 0 {
            return Err(PaymentError::Validation("Amount must be greater than zero".into()));
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            id: id.clone(),
            amount_minor: request.amount_minor,
            currency: request.currency.to_uppercase(),
            status: IntentStatus::RequiresPaymentMethod,
            metadata: request.metadata,
            redirect_url: None,
        };

        self.intents.write().await.insert(id, intent.clone());
        tracing::debug!(payment_intent_id = %intent.id, amount = intent.amount_minor, "Mock intent created");
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))
    }

    async fn confirm_intent(&self, intent_id: &str, request: ConfirmIntent) -> Result<PaymentIntent> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;

        if intent.status == IntentStatus::Succeeded {
            return Err(PaymentError::Validation(format!(
                "Payment intent {intent_id} has already succeeded"
            )));
        }

        match request.payment_method.as_str() {
            TEST_CARD_SUCCEEDS => {
                intent.status = IntentStatus::Succeeded;
            }
            TEST_CARD_REQUIRES_ACTION => {
                intent.status = IntentStatus::RequiresAction;
                intent.redirect_url = Some(format!(
                    "https://hooks.mock-gateway.test/3ds/{intent_id}?return_url={}",
                    request.return_url
                ));
            }
            TEST_CARD_DECLINED => {
                intent.status = IntentStatus::RequiresPaymentMethod;
                return Err(PaymentError::Declined("Your card was declined.".into()));
            }
            other => {
                return Err(PaymentError::Validation(format!("No such payment method: {other}")));
            }
        }

        Ok(intent.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
