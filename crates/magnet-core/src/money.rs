//! Currency Minor Units
//!
//! Prices travel as decimal major units (`9.99`); the payment gateway charges
//! integer minor units (`999` pence). Conversions round half away from zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{CoreError, Result};

/// Currencies charged without a fractional unit
const ZERO_DECIMAL: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Currencies with three fractional digits
const THREE_DECIMAL: &[&str] = &["BHD", "JOD", "KWD", "OMR", "TND"];

/// Number of fractional digits the gateway uses for `currency`
pub fn minor_unit_exponent(currency: &str) -> u32 {
    let code = currency.to_uppercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        3
    } else {
        2
    }
}

/// Convert a major-unit amount to minor units, rounding to the currency precision
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64> {
    let exponent = minor_unit_exponent(currency);
    let rounded = amount.round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero);
    let scale = Decimal::from(10_i64.pow(exponent));

    rounded
        .checked_mul(scale)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| CoreError::AmountOverflow(format!("{amount} {currency}")))
}

/// Convert minor units back to a major-unit amount
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_exponent(currency))
}

/// Normalize a user-supplied currency code (`gbp` → `GBP`)
pub fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::Validation(format!(
            "Unsupported currency code: {currency}"
        )));
    }
    Ok(code)
}
