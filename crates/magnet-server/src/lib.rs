//! magnet-shop HTTP Server
//!
//! Axum router exposing the checkout REST API:
//!
//! ```text
//! GET    /health
//! POST   /payment-intent                 cart → clientSecret
//! POST   /checkout/pending               snapshot → token
//! GET    /checkout/pending/{token}
//! DELETE /checkout/pending/{token}
//! POST   /orders/create                  paid intent → order
//! GET    /orders
//! GET    /orders/{id}
//! GET    /addresses
//! POST   /addresses
//! PATCH  /admin/orders/{id}/status
//! POST   /payments/webhook               signed gateway events
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    add_address, create_order, create_payment_intent, create_pending_checkout,
    delete_pending_checkout, get_order, get_pending_checkout, health_check, list_addresses,
    list_orders, payment_webhook, update_order_status,
};

pub use crate::config::ServerConfig;
pub use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout
        .route("/payment-intent", post(create_payment_intent))
        .route("/checkout/pending", post(create_pending_checkout))
        .route(
            "/checkout/pending/{token}",
            get(get_pending_checkout).delete(delete_pending_checkout),
        )
        .route("/orders/create", post(create_order))

        // Account
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/addresses", get(list_addresses).post(add_address))

        // Admin
        .route("/admin/orders/{id}/status", patch(update_order_status))

        // Gateway
        .route("/payments/webhook", post(payment_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
