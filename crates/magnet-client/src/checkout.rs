//! Checkout Flow
//!
//! ```text
//! begin ──▶ IntentTicket
//!              │
//! submit ──▶ stash snapshot ──▶ confirm ──┬─ succeeded ──▶ create order ──▶ discard ──▶ Completed
//!                                         ├─ redirect  ──▶ Redirect (snapshot kept)
//!                                         └─ processing ─▶ create order ──▶ discard ──▶ Processing
//!
//! resume_after_redirect(return URL) ──▶ load snapshot ──▶ create order ──▶ discard ──▶ Completed
//! ```
//!
//! The snapshot is written before confirming so nothing is lost if the
//! gateway navigates away. Creating the order twice for one intent is
//! harmless: the server answers with the existing order.

use magnet_core::{Cart, CheckoutToken, PendingOrder};
use magnet_payments::{IntentRequest, IntentTicket};
use reqwest::Url;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::OrderApi;
use crate::confirm::{Confirmation, PaymentConfirmer};
use crate::error::{ClientError, Result};
use crate::vault::PendingOrderVault;

/// Query parameter carrying the pending checkout token through a redirect
pub const CHECKOUT_TOKEN_PARAM: &str = "checkout_token";

/// Result of a checkout step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Order created
    Completed { order_id: Uuid },
    /// Send the customer to this URL to authenticate
    Redirect { url: String },
    /// Order created while the payment is still settling; a webhook marks it paid
    Processing { order_id: Uuid },
}

/// Drives one customer's checkout
pub struct CheckoutClient<A: OrderApi, C: PaymentConfirmer, V: PendingOrderVault> {
    api: A,
    confirmer: C,
    vault: V,
}

impl<A: OrderApi, C: PaymentConfirmer, V: PendingOrderVault> CheckoutClient<A, C, V> {
    pub const fn new(api: A, confirmer: C, vault: V) -> Self {
        Self {
            api,
            confirmer,
            vault,
        }
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    pub const fn vault(&self) -> &V {
        &self.vault
    }

    /// Open a payment intent for the cart
    pub async fn begin(&self, cart: Cart, currency: &str) -> Result<IntentTicket> {
        let ticket = self
            .api
            .create_payment_intent(&IntentRequest {
                cart,
                currency: currency.to_string(),
                metadata: HashMap::new(),
            })
            .await?;
        tracing::debug!(payment_intent_id = %ticket.payment_intent_id, "Payment intent ready");
        Ok(ticket)
    }

    /// Confirm payment for `order` and create the order if payment finishes inline
    pub async fn submit(
        &self,
        ticket: &IntentTicket,
        order: PendingOrder,
        payment_method: &str,
        return_url: &str,
    ) -> Result<CheckoutOutcome> {
        if order.shipping_address_id.trim().is_empty() {
            return Err(ClientError::MissingAddress);
        }

        let token = self.vault.stash(&order).await?;
        let return_url = with_token(return_url, token.as_ref())?;

        let confirmation = self
            .confirmer
            .confirm(ticket, payment_method, &return_url)
            .await?;

        match confirmation {
            Confirmation::Succeeded { payment_intent_id } => {
                let order_id = self
                    .finalize(&payment_intent_id, &order, token.as_ref())
                    .await?;
                Ok(CheckoutOutcome::Completed { order_id })
            }
            Confirmation::RedirectRequired { url } => {
                tracing::info!(payment_intent_id = %ticket.payment_intent_id, "Payment needs authentication");
                Ok(CheckoutOutcome::Redirect { url })
            }
            Confirmation::Processing { payment_intent_id } => {
                tracing::info!(payment_intent_id = %payment_intent_id, "Payment processing");
                let order_id = self
                    .finalize(&payment_intent_id, &order, token.as_ref())
                    .await?;
                Ok(CheckoutOutcome::Processing { order_id })
            }
        }
    }

    /// Finish a checkout when the gateway sends the customer back
    pub async fn resume_after_redirect(&self, return_url: &str) -> Result<CheckoutOutcome> {
        let params = ReturnParams::parse(return_url)?;

        match params.redirect_status.as_deref() {
            Some("succeeded") => {}
            Some(status) => {
                tracing::info!(payment_intent_id = %params.payment_intent_id, status, "Payment not completed after redirect");
                return Err(ClientError::Declined(format!(
                    "Authentication finished with status {status}"
                )));
            }
            None => {
                return Err(ClientError::Unexpected(
                    "Return URL carries no payment result".into(),
                ));
            }
        }

        let order = self
            .vault
            .load(params.checkout_token.as_ref())
            .await?
            .ok_or_else(|| {
                ClientError::Unexpected("Saved order details were not found".into())
            })?;

        let order_id = self
            .finalize(&params.payment_intent_id, &order, params.checkout_token.as_ref())
            .await?;
        Ok(CheckoutOutcome::Completed { order_id })
    }

    async fn finalize(
        &self,
        payment_intent_id: &str,
        order: &PendingOrder,
        token: Option<&CheckoutToken>,
    ) -> Result<Uuid> {
        let result = self.api.create_order(payment_intent_id, order).await?;

        // The order exists; a stale snapshot is only replaced by the next checkout.
        if let Err(e) = self.vault.discard(token).await {
            tracing::warn!(error = %e, "Failed to discard saved order details");
        }

        tracing::info!(
            order_id = %result.order_id,
            payment_intent_id,
            created = result.created,
            "Checkout completed"
        );
        Ok(result.order_id)
    }
}

fn with_token(return_url: &str, token: Option<&CheckoutToken>) -> Result<String> {
    let mut url = Url::parse(return_url)
        .map_err(|e| ClientError::Validation(format!("Invalid return URL: {e}")))?;
    if let Some(token) = token {
        url.query_pairs_mut()
            .append_pair(CHECKOUT_TOKEN_PARAM, token.as_str());
    }
    Ok(url.into())
}

/// Parameters the gateway appends to the return URL
#[derive(Debug, PartialEq, Eq)]
struct ReturnParams {
    payment_intent_id: String,
    redirect_status: Option<String>,
    checkout_token: Option<CheckoutToken>,
}

impl ReturnParams {
    fn parse(return_url: &str) -> Result<Self> {
        let url = Url::parse(return_url)
            .map_err(|e| ClientError::Unexpected(format!("Malformed return URL: {e}")))?;

        let mut payment_intent_id = None;
        let mut redirect_status = None;
        let mut checkout_token = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                "payment_intent" => payment_intent_id = Some(value.into_owned()),
                "redirect_status" => redirect_status = Some(value.into_owned()),
                CHECKOUT_TOKEN_PARAM => checkout_token = Some(CheckoutToken::from_string(value)),
                _ => {}
            }
        }

        let payment_intent_id = payment_intent_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::Unexpected("Return URL carries no payment intent".into()))?;

        Ok(Self {
            payment_intent_id,
            redirect_status,
            checkout_token,
        })
    }
}
