//! Payment Confirmation
//!
//! In the browser this is Stripe.js `confirmPayment` with the client
//! secret; here it is any `PaymentConfirmer`.

use async_trait::async_trait;
use magnet_core::IntentStatus;
use magnet_payments::{ConfirmIntent, IntentTicket, PaymentGateway};
use std::sync::Arc;

use crate::error::{ClientError, Result};

/// What the gateway said about a confirmation attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Charged without leaving the page
    Succeeded { payment_intent_id: String },
    /// Customer must authenticate off-site, then comes back to the return URL
    RedirectRequired { url: String },
    /// Charge accepted but not settled yet
    Processing { payment_intent_id: String },
}

#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    async fn confirm(
        &self,
        ticket: &IntentTicket,
        payment_method: &str,
        return_url: &str,
    ) -> Result<Confirmation>;
}

/// Confirms directly against a `PaymentGateway`
pub struct GatewayConfirmer {
    gateway: Arc<dyn PaymentGateway>,
}

impl GatewayConfirmer {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PaymentConfirmer for GatewayConfirmer {
    async fn confirm(
        &self,
        ticket: &IntentTicket,
        payment_method: &str,
        return_url: &str,
    ) -> Result<Confirmation> {
        let intent = self
            .gateway
            .confirm_intent(
                &ticket.payment_intent_id,
                ConfirmIntent {
                    payment_method: payment_method.to_string(),
                    return_url: return_url.to_string(),
                },
            )
            .await?;

        match intent.status {
            IntentStatus::Succeeded => Ok(Confirmation::Succeeded {
                payment_intent_id: intent.id,
            }),
            IntentStatus::RequiresAction => intent
                .redirect_url
                .map(|url| Confirmation::RedirectRequired { url })
                .ok_or_else(|| {
                    ClientError::Unexpected("Authentication required but no redirect given".into())
                }),
            status if status.is_settling() => Ok(Confirmation::Processing {
                payment_intent_id: intent.id,
            }),
            IntentStatus::RequiresPaymentMethod => {
                Err(ClientError::Declined("Payment method was not accepted".into()))
            }
            other => Err(ClientError::Unexpected(format!(
                "Payment ended in status {other}"
            ))),
        }
    }
}
