//! Cart Snapshot
//!
//! The client-held cart as it arrives at the checkout endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Highest unit or line price accepted from a client, in major units
pub const MAX_CLIENT_PRICE: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// One line of the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product (magnet size/finish) being ordered
    pub product_ref: String,

    /// Number of magnets
    pub quantity: u32,

    /// Client-computed price of a single unit
    #[serde(default, alias = "price", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,

    /// Client-computed price for the whole line (takes precedence over `unit_price`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,

    /// Gateway catalog price id, looked up server-side when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_ref: Option<String>,

    /// Uploaded and cropped photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Magnet size label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl LineItem {
    /// Create a line priced per unit
    pub fn new(product_ref: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_ref: product_ref.into(),
            quantity,
            unit_price: Some(unit_price),
            total_price: None,
            price_ref: None,
            image_ref: None,
            size: None,
        }
    }

    /// Attach the uploaded image
    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Attach a gateway catalog price id
    #[must_use]
    pub fn with_price_ref(mut self, price_ref: impl Into<String>) -> Self {
        self.price_ref = Some(price_ref.into());
        self
    }

    /// Line contribution from client-supplied prices; `None` when the line
    /// carries no price
    pub fn fallback_contribution(&self) -> Result<Option<Decimal>> {
        match (self.total_price, self.unit_price) {
            (Some(total), _) => Ok(Some(total)),
            (None, Some(unit)) => line_amount(unit, self.quantity).map(Some),
            (None, None) => Ok(None),
        }
    }

    fn check_prices(&self) -> Result<()> {
        for price in [self.unit_price, self.total_price].into_iter().flatten() {
            if price.is_sign_negative() && !price.is_zero() {
                return Err(CoreError::Validation(format!(
                    "Price for {} cannot be negative.",
                    self.product_ref
                )));
            }
            if price > MAX_CLIENT_PRICE {
                return Err(CoreError::Validation(format!(
                    "Price for {} is too large.",
                    self.product_ref
                )));
            }
        }
        Ok(())
    }

    /// Price of a single unit as recorded on the order item
    pub fn price_per_unit(&self) -> Option<Decimal> {
        self.unit_price.or_else(|| {
            self.total_price
                .filter(|_| self.quantity > 0)
                .map(|total| total / Decimal::from(self.quantity))
        })
    }
}

/// Ordered cart lines
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    pub items: Vec<LineItem>,
}

impl Cart {
    pub const fn new(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of magnets across lines
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |count, item| count.saturating_add(item.quantity))
    }

    /// Reject carts that cannot be priced
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(CoreError::Validation("Your cart is empty.".into()));
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(CoreError::Validation(format!(
                "Quantity for {} must be at least 1.",
                item.product_ref
            )));
        }
        self.items.iter().try_for_each(LineItem::check_prices)
    }

    /// Sum of client-supplied line prices
    pub fn subtotal(&self) -> Result<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |sum, item| {
            let line = item.fallback_contribution()?.ok_or_else(|| {
                CoreError::Validation(format!("No price given for {}.", item.product_ref))
            })?;
            checked_sum(sum, line)
        })
    }
}

/// `unit × quantity`, failing instead of overflowing
pub fn line_amount(unit: Decimal, quantity: u32) -> Result<Decimal> {
    unit.checked_mul(Decimal::from(quantity))
        .ok_or_else(|| CoreError::AmountOverflow(format!("{unit} x {quantity}")))
}

/// `a + b`, failing instead of overflowing
pub fn checked_sum(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| CoreError::AmountOverflow(format!("{a} + {b}")))
}

impl From<Vec<LineItem>> for Cart {
    fn from(items: Vec<LineItem>) -> Self {
        Self::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_alias_from_storefront_json() {
        let item: LineItem =
            serde_json::from_str(r#"{"productRef":"magnet-square","price":9.99,"quantity":2}"#)
                .unwrap();
        assert_eq!(item.unit_price, Some(dec!(9.99)));
        assert_eq!(item.fallback_contribution().unwrap(), Some(dec!(19.98)));
    }

    #[test]
    fn test_total_price_takes_precedence() {
        let mut item = LineItem::new("magnet-round", 3, dec!(5.00));
        item.total_price = Some(dec!(12.00));
        assert_eq!(item.fallback_contribution().unwrap(), Some(dec!(12.00)));
    }

    #[test]
    fn test_price_per_unit_from_line_total() {
        let mut item = LineItem::new("magnet-round", 4, dec!(0));
        item.unit_price = None;
        item.total_price = Some(dec!(10.00));
        assert_eq!(item.price_per_unit(), Some(dec!(2.50)));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(Cart::default().validate().is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let cart = Cart::new(vec![LineItem::new("magnet-square", 0, dec!(9.99))]);
        assert!(matches!(cart.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_negative_prices_rejected() {
        let cart = Cart::new(vec![
            LineItem::new("magnet-square", 1, dec!(12.50)),
            LineItem::new("magnet-round", 1, dec!(-12.49)),
        ]);
        assert!(matches!(cart.validate(), Err(CoreError::Validation(_))));

        let mut item = LineItem::new("magnet-square", 1, dec!(1.00));
        item.total_price = Some(dec!(-1.00));
        assert!(Cart::new(vec![item]).validate().is_err());

        // Zero is a price, not a negative one; the issuer rejects a zero total.
        assert!(Cart::new(vec![LineItem::new("magnet-free", 1, dec!(0))]).validate().is_ok());
    }

    #[test]
    fn test_oversized_prices_rejected() {
        let huge = LineItem::new("magnet-square", 2, dec!(70000000000000000000000000000));
        assert!(matches!(
            Cart::new(vec![huge]).validate(),
            Err(CoreError::Validation(_))
        ));
        assert!(Cart::new(vec![LineItem::new("magnet-square", 1, MAX_CLIENT_PRICE)]).validate().is_ok());
    }

    #[test]
    fn test_line_amount_overflow_is_an_error() {
        let err = line_amount(Decimal::MAX, 2).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(_)));
        assert!(checked_sum(Decimal::MAX, Decimal::ONE).is_err());
        assert_eq!(line_amount(dec!(9.99), 2).unwrap(), dec!(19.98));
    }

    #[test]
    fn test_subtotal_requires_prices() {
        let mut item = LineItem::new("magnet-square", 1, dec!(9.99));
        item.unit_price = None;
        assert!(Cart::new(vec![item]).subtotal().is_err());

        let cart = Cart::new(vec![
            LineItem::new("magnet-square", 2, dec!(9.99)),
            LineItem::new("magnet-round", 1, dec!(4.50)),
        ]);
        assert_eq!(cart.subtotal().unwrap(), dec!(24.48));
        assert_eq!(cart.item_count(), 3);
    }
}
