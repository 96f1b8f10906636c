//! Checkout Server API

use async_trait::async_trait;
use magnet_core::{CheckoutToken, PendingOrder};
use magnet_payments::{FinalizedOrder, IntentRequest, IntentTicket};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Server operations the checkout client needs
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// `POST /payment-intent`
    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<IntentTicket>;

    /// `POST /orders/create`
    async fn create_order(&self, payment_intent_id: &str, order: &PendingOrder) -> Result<FinalizedOrder>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody<'a> {
    #[serde(flatten)]
    order: &'a PendingOrder,
    payment_intent_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingBody<'a> {
    items: &'a [magnet_core::LineItem],
    total: rust_decimal::Decimal,
    shipping_address_id: &'a str,
}

#[derive(Deserialize)]
struct PendingCreated {
    token: CheckoutToken,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `reqwest` client for the checkout server, authenticated with a bearer token
#[derive(Clone)]
pub struct HttpOrderApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpOrderApi {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map_or_else(|_| "Request failed".to_string(), |body| body.error);
        tracing::debug!(status = status.as_u16(), %message, "Checkout server rejected request");
        Err(ClientError::from_status(status.as_u16(), message))
    }

    /// `POST /checkout/pending`
    pub async fn save_pending(&self, order: &PendingOrder) -> Result<CheckoutToken> {
        let response = self
            .client
            .post(self.url("/checkout/pending"))
            .bearer_auth(&self.bearer_token)
            .json(&PendingBody {
                items: &order.items,
                total: order.total,
                shipping_address_id: &order.shipping_address_id,
            })
            .send()
            .await?;
        let created: PendingCreated = Self::read(response).await?;
        Ok(created.token)
    }

    /// `GET /checkout/pending/{token}`, `None` once expired or consumed
    pub async fn load_pending(&self, token: &CheckoutToken) -> Result<Option<PendingOrder>> {
        let response = self
            .client
            .get(self.url(&format!("/checkout/pending/{token}")))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::read(response).await?))
    }

    /// `DELETE /checkout/pending/{token}`
    pub async fn discard_pending(&self, token: &CheckoutToken) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/checkout/pending/{token}")))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ClientError::from_status(status.as_u16(), "Could not discard checkout".into()))
        }
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<IntentTicket> {
        let response = self
            .client
            .post(self.url("/payment-intent"))
            .bearer_auth(&self.bearer_token)
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn create_order(&self, payment_intent_id: &str, order: &PendingOrder) -> Result<FinalizedOrder> {
        let response = self
            .client
            .post(self.url("/orders/create"))
            .bearer_auth(&self.bearer_token)
            .json(&CreateOrderBody {
                order,
                payment_intent_id,
            })
            .send()
            .await?;
        Self::read(response).await
    }
}
