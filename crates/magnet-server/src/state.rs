//! Application State

use std::sync::Arc;

use magnet_core::{
    AddressStore, MemoryAddressStore, MemoryOrderStore, MemoryPendingCheckoutStore, OrderStore,
    PendingCheckoutStore,
};
use magnet_payments::{
    IntentIssuer, OrderFinalizer, PaymentGateway, SignatureVerifier, WebhookReconciler,
};

use crate::auth::JwtVerifier;
use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway (Stripe, or the mock in development)
    pub gateway: Arc<dyn PaymentGateway>,

    pub orders: Arc<dyn OrderStore>,
    pub addresses: Arc<dyn AddressStore>,

    /// Snapshots carried across payment redirects
    pub pending: Arc<dyn PendingCheckoutStore>,

    pub issuer: Arc<IntentIssuer>,
    pub finalizer: Arc<OrderFinalizer>,
    pub reconciler: Arc<WebhookReconciler>,

    /// Webhook signature check (None if no signing secret is configured)
    pub webhook: Option<SignatureVerifier>,

    pub auth: Arc<JwtVerifier>,
    pub pending_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        addresses: Arc<dyn AddressStore>,
        pending: Arc<dyn PendingCheckoutStore>,
    ) -> Self {
        let ttl_secs = i64::try_from(config.pending_ttl_secs).unwrap_or(i64::MAX);

        Self {
            issuer: Arc::new(IntentIssuer::new(gateway.clone())),
            finalizer: Arc::new(OrderFinalizer::new(
                gateway.clone(),
                orders.clone(),
                addresses.clone(),
            )),
            reconciler: Arc::new(WebhookReconciler::new(orders.clone())),
            webhook: config
                .webhook_secret
                .as_deref()
                .map(|secret| SignatureVerifier::new(secret, config.webhook_tolerance_secs)),
            auth: Arc::new(JwtVerifier::new(
                &config.jwt_secret,
                config.jwt_audience.as_deref(),
                config.admin_user_ids.clone(),
            )),
            pending_ttl: chrono::Duration::try_seconds(ttl_secs)
                .unwrap_or_else(|| chrono::Duration::seconds(1800)),
            gateway,
            orders,
            addresses,
            pending,
        }
    }

    /// State backed by the in-memory stores
    pub fn in_memory(config: &ServerConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::new(
            config,
            gateway,
            Arc::new(MemoryOrderStore::new()),
            Arc::new(MemoryAddressStore::new()),
            Arc::new(MemoryPendingCheckoutStore::new()),
        )
    }
}
