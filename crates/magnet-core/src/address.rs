//! Shipping Addresses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A saved shipping address owned by one customer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

/// Fields the customer fills in
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl NewAddress {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("full name", &self.full_name),
            ("address line", &self.line1),
            ("city", &self.city),
            ("postal code", &self.postal_code),
            ("country", &self.country),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("Please enter a {label}.")));
            }
        }
        Ok(())
    }

    pub fn into_address(self, user_id: impl Into<String>) -> Address {
        Address {
            id: format!("addr_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.into(),
            full_name: self.full_name,
            line1: self.line1,
            line2: self.line2,
            city: self.city,
            postal_code: self.postal_code,
            country: self.country.to_uppercase(),
            created_at: Utc::now(),
        }
    }
}
