//! Stripe Payment Intents
//!
//! Implements the "Stripe Elements (Embedded)" approach: the server opens a
//! payment intent and hands its client secret to the browser, which confirms
//! it in place and may be redirected for 3-D Secure.

use async_trait::async_trait;
use magnet_core::IntentStatus;
use serde::Serialize;
use std::str::FromStr;
use stripe::{Client, CreatePaymentIntent, Currency, PaymentIntentId, Price, PriceId};

use super::{ConfirmIntent, CreateIntent, PaymentGateway, PaymentIntent};
use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Get the underlying Stripe client
    pub const fn inner(&self) -> &Client {
        &self.client
    }
}

#[derive(Serialize)]
struct ConfirmParams<'a> {
    payment_method: &'a str,
    return_url: &'a str,
}

fn parse_intent_id(intent_id: &str) -> Result<PaymentIntentId> {
    PaymentIntentId::from_str(intent_id)
        .map_err(|_| PaymentError::Validation(format!("Malformed payment intent id: {intent_id}")))
}

const fn intent_status(status: stripe::PaymentIntentStatus) -> IntentStatus {
    use stripe::PaymentIntentStatus as S;
    match status {
        S::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        S::RequiresConfirmation => IntentStatus::RequiresConfirmation,
        S::RequiresAction => IntentStatus::RequiresAction,
        S::Processing => IntentStatus::Processing,
        S::RequiresCapture => IntentStatus::RequiresCapture,
        S::Canceled => IntentStatus::Canceled,
        S::Succeeded => IntentStatus::Succeeded,
    }
}

impl From<stripe::PaymentIntent> for PaymentIntent {
    fn from(intent: stripe::PaymentIntent) -> Self {
        let redirect_url = intent
            .next_action
            .as_ref()
            .and_then(|action| action.redirect_to_url.as_ref())
            .and_then(|redirect| redirect.url.clone());

        Self {
            id: intent.id.to_string(),
            client_secret: intent.client_secret,
            amount_minor: intent.amount,
            currency: intent.currency.to_string().to_uppercase(),
            status: intent_status(intent.status),
            metadata: intent.metadata.into_iter().collect(),
            redirect_url,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn catalog_unit_amount(&self, price_ref: &str) -> Result<Option<i64>> {
        let Ok(price_id) = PriceId::from_str(price_ref) else {
            return Ok(None);
        };

        match Price::retrieve(&self.client, &price_id, &[]).await {
            Ok(price) if price.active.unwrap_or(true) => Ok(price.unit_amount),
            Ok(_) => Err(PaymentError::InvalidPrice(format!("{price_ref} is inactive"))),
            Err(err) => match PaymentError::from(err) {
                PaymentError::IntentNotFound(_) | PaymentError::Validation(_) => {
                    Err(PaymentError::InvalidPrice(price_ref.to_string()))
                }
                other => Err(other),
            },
        }
    }

    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent> {
        let currency: Currency =
            serde_json::from_value(serde_json::Value::String(request.currency.to_lowercase()))
                .map_err(|_| {
                    PaymentError::Validation(format!("Unsupported currency: {}", request.currency))
                })?;

        let mut params = CreatePaymentIntent::new(request.amount_minor, currency);
        params.metadata = Some(request.metadata);
        params.payment_method_types = Some(vec!["card".to_owned()]);

        let intent = stripe::PaymentIntent::create(&self.client, params).await?;

        tracing::info!(
            payment_intent_id = %intent.id,
            amount = intent.amount,
            "Created Stripe payment intent"
        );
        Ok(intent.into())
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
        let id = parse_intent_id(intent_id)?;
        let intent = stripe::PaymentIntent::retrieve(&self.client, &id, &[]).await?;
        Ok(intent.into())
    }

    async fn confirm_intent(&self, intent_id: &str, request: ConfirmIntent) -> Result<PaymentIntent> {
        let id = parse_intent_id(intent_id)?;
        let params = ConfirmParams {
            payment_method: &request.payment_method,
            return_url: &request.return_url,
        };

        let intent: stripe::PaymentIntent = self
            .client
            .post_form(&format!("/payment_intents/{id}/confirm"), params)
            .await?;
        Ok(intent.into())
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
