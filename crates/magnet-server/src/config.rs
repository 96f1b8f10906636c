//! Server Configuration
//!
//! Read once at startup from the environment (`.env` is loaded first).

use std::collections::HashSet;

use magnet_payments::DEFAULT_TOLERANCE_SECS;
use thiserror::Error;

/// Default lifetime of a server-side pending checkout
pub const DEFAULT_PENDING_TTL_SECS: u64 = 30 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Stripe credentials; both keys are needed to talk to Stripe
#[derive(Clone, Debug)]
pub struct StripeKeys {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// `None` runs the server against the mock gateway
    pub stripe: Option<StripeKeys>,
    /// Signing secret for webhook events, also set without Stripe keys for local testing
    pub webhook_secret: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub admin_user_ids: HashSet<String>,
    pub pending_ttl_secs: u64,
    pub webhook_tolerance_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jwt_secret = var("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?;
        let webhook_secret = var("STRIPE_WEBHOOK_SECRET");
        let stripe = match (var("STRIPE_SECRET_KEY"), webhook_secret.clone()) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeKeys {
                secret_key,
                webhook_secret,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET")),
            _ => None,
        };

        let admin_user_ids = var("ADMIN_USER_IDS")
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            stripe,
            webhook_secret,
            jwt_secret,
            jwt_audience: var("AUTH_JWT_AUDIENCE"),
            admin_user_ids,
            pending_ttl_secs: seconds(
                "PENDING_CHECKOUT_TTL_SECS",
                var("PENDING_CHECKOUT_TTL_SECS"),
                DEFAULT_PENDING_TTL_SECS,
            )?,
            webhook_tolerance_secs: seconds(
                "WEBHOOK_TOLERANCE_SECS",
                var("WEBHOOK_TOLERANCE_SECS"),
                DEFAULT_TOLERANCE_SECS,
            )?,
        })
    }
}

fn seconds(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}
