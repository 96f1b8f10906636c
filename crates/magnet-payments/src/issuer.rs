//! Payment Intent Issuer
//!
//! Prices a cart and opens a payment intent for it. Nothing is persisted
//! locally at this stage; the intent lives only at the gateway.

use magnet_core::cart::{checked_sum, line_amount};
use magnet_core::{money, Cart, LineItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::gateway::{CreateIntent, PaymentGateway, USER_ID_METADATA_KEY};

/// Request to open a payment intent
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    pub cart: Cart,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// What the browser needs to confirm the payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentTicket {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Per-line pricing used for the charge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedLine {
    pub product_ref: String,
    pub quantity: u32,
    /// Price of one unit as charged
    pub unit_price: Decimal,
    pub contribution: Decimal,
    /// Price came from the gateway catalog rather than the client
    pub from_catalog: bool,
}

/// Priced cart
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
    pub amount_minor: i64,
    pub currency: String,
}

/// Opens payment intents for carts
pub struct IntentIssuer {
    gateway: Arc<dyn PaymentGateway>,
}

impl IntentIssuer {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    /// Price every line: catalog price when the line names one the gateway
    /// knows, else the client-supplied price.
    pub async fn quote(&self, cart: &Cart, currency: &str) -> Result<Quote> {
        quote_cart(self.gateway.as_ref(), cart, currency).await
    }

    /// Price the cart and open an intent for the authenticated user
    pub async fn issue(&self, request: IntentRequest, user_id: &str) -> Result<IntentTicket> {
        if user_id.is_empty() {
            return Err(PaymentError::Unauthenticated("No user for payment intent".into()));
        }

        let quote = self.quote(&request.cart, &request.currency).await?;

        let mut metadata = request.metadata;
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user_id.to_string());
        metadata.insert("item_count".to_string(), request.cart.item_count().to_string());

        let intent = self
            .gateway
            .create_intent(CreateIntent {
                amount_minor: quote.amount_minor,
                currency: quote.currency.clone(),
                metadata,
            })
            .await?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Gateway("No client secret returned".into()))?;

        tracing::info!(
            payment_intent_id = %intent.id,
            user_id,
            amount = quote.amount_minor,
            currency = %quote.currency,
            gateway = self.gateway.name(),
            "Issued payment intent"
        );

        Ok(IntentTicket {
            client_secret,
            payment_intent_id: intent.id,
        })
    }
}

/// Price `cart` against the gateway catalog. Shared by intent issuing and
/// order finalization so both see the same line prices.
pub(crate) async fn quote_cart(
    gateway: &dyn PaymentGateway,
    cart: &Cart,
    currency: &str,
) -> Result<Quote> {
    cart.validate()?;
    let currency = money::normalize_currency(currency)?;

    let mut lines = Vec::with_capacity(cart.items.len());
    let mut total = Decimal::ZERO;
    for item in &cart.items {
        let line = price_line(gateway, item, &currency).await?;
        total = checked_sum(total, line.contribution)?;
        lines.push(line);
    }

    let amount_minor = money::to_minor_units(total, &currency)?;
    if amount_minor <= 0 {
        return Err(PaymentError::Validation(
            "Order total must be greater than zero.".into(),
        ));
    }

    Ok(Quote {
        lines,
        total,
        amount_minor,
        currency,
    })
}

async fn price_line(gateway: &dyn PaymentGateway, item: &LineItem, currency: &str) -> Result<PricedLine> {
    if let Some(price_ref) = item.price_ref.as_deref() {
        if let Some(unit_amount) = gateway.catalog_unit_amount(price_ref).await? {
            let unit = money::from_minor_units(unit_amount, currency);
            return Ok(PricedLine {
                product_ref: item.product_ref.clone(),
                quantity: item.quantity,
                unit_price: unit,
                contribution: line_amount(unit, item.quantity)?,
                from_catalog: true,
            });
        }
        tracing::debug!(price_ref, "Catalog price not found, using client price");
    }

    let missing = || PaymentError::Validation(format!("No price available for {}.", item.product_ref));
    let contribution = item.fallback_contribution()?.ok_or_else(missing)?;
    let unit_price = item.price_per_unit().ok_or_else(missing)?;
    Ok(PricedLine {
        product_ref: item.product_ref.clone(),
        quantity: item.quantity,
        unit_price,
        contribution,
        from_catalog: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use magnet_core::MAX_CLIENT_PRICE;
    use rust_decimal_macros::dec;

    fn issuer_with(gateway: MockGateway) -> (IntentIssuer, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        (IntentIssuer::new(gateway.clone()), gateway)
    }

    fn request(items: Vec<LineItem>) -> IntentRequest {
        IntentRequest {
            cart: Cart::new(items),
            currency: "gbp".into(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_gbp_cart_charged_in_pence() {
        let (issuer, gateway) = issuer_with(MockGateway::new());
        let ticket = issuer
            .issue(request(vec![LineItem::new("magnet-square", 2, dec!(9.99))]), "user_1")
            .await
            .unwrap();

        let intent = gateway.retrieve_intent(&ticket.payment_intent_id).await.unwrap();
        assert_eq!(intent.amount_minor, 1998);
        assert_eq!(intent.currency, "GBP");
        assert_eq!(intent.user_id(), Some("user_1"));
        assert_eq!(intent.client_secret.as_deref(), Some(ticket.client_secret.as_str()));
    }

    #[tokio::test]
    async fn test_total_is_sum_of_contributions_rounded_once() {
        let (issuer, _) = issuer_with(MockGateway::new());
        let mut third = LineItem::new("magnet-mini", 1, dec!(0));
        third.unit_price = None;
        third.total_price = Some(dec!(1.005));

        let quote = issuer
            .quote(
                &Cart::new(vec![
                    LineItem::new("magnet-square", 3, dec!(3.333)),
                    LineItem::new("magnet-round", 1, dec!(0.001)),
                    third,
                ]),
                "usd",
            )
            .await
            .unwrap();

        // 9.999 + 0.001 + 1.005 = 11.005 → 1101 cents
        assert_eq!(quote.total, dec!(11.005));
        assert_eq!(quote.amount_minor, 1101);
    }

    #[tokio::test]
    async fn test_catalog_price_wins_over_client_price() {
        let (issuer, _) = issuer_with(MockGateway::new().with_price("price_square", 1250));
        let quote = issuer
            .quote(
                &Cart::new(vec![
                    LineItem::new("magnet-square", 2, dec!(0.01)).with_price_ref("price_square"),
                    LineItem::new("magnet-round", 1, dec!(4.00)).with_price_ref("price_unknown"),
                ]),
                "gbp",
            )
            .await
            .unwrap();

        assert!(quote.lines[0].from_catalog);
        assert!(!quote.lines[1].from_catalog);
        assert_eq!(quote.amount_minor, 2900);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_without_intent() {
        let (issuer, gateway) = issuer_with(MockGateway::new());
        let err = issuer.issue(request(Vec::new()), "user_1").await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_total_rejected_without_intent() {
        let (issuer, gateway) = issuer_with(MockGateway::new());
        for price in [dec!(0), dec!(-5.00), dec!(0.004)] {
            let err = issuer
                .issue(request(vec![LineItem::new("magnet-square", 1, price)]), "user_1")
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_price_rejected_without_panic() {
        let (issuer, gateway) = issuer_with(MockGateway::new());
        let item: LineItem = serde_json::from_str(
            r#"{"productRef":"m","price":"70000000000000000000000000000","quantity":2}"#,
        )
        .unwrap();

        let err = issuer.issue(request(vec![item]), "user_1").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[tokio::test]
    async fn test_cart_too_large_to_charge_rejected() {
        let (issuer, _) = issuer_with(MockGateway::new());
        let lines = vec![LineItem::new("magnet-square", u32::MAX, MAX_CLIENT_PRICE); 1024];

        // Sums fine in Decimal, but no longer fits the gateway's minor units.
        let err = issuer.quote(&Cart::new(lines), "gbp").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_negative_line_cannot_discount_catalog_price() {
        let (issuer, gateway) = issuer_with(MockGateway::new().with_price("price_square", 1250));
        let err = issuer
            .issue(
                request(vec![
                    LineItem::new("magnet-square", 1, dec!(12.50)).with_price_ref("price_square"),
                    LineItem::new("magnet-round", 1, dec!(-12.49)),
                ]),
                "user_1",
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[tokio::test]
    async fn test_client_metadata_cannot_override_user() {
        let (issuer, gateway) = issuer_with(MockGateway::new());
        let mut req = request(vec![LineItem::new("magnet-square", 1, dec!(9.99))]);
        req.metadata.insert("user_id".into(), "someone_else".into());
        req.metadata.insert("campaign".into(), "spring".into());

        let ticket = issuer.issue(req, "user_1").await.unwrap();
        let intent = gateway.retrieve_intent(&ticket.payment_intent_id).await.unwrap();
        assert_eq!(intent.user_id(), Some("user_1"));
        assert_eq!(intent.metadata.get("campaign").map(String::as_str), Some("spring"));
    }
}
