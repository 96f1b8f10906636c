//! magnet-shop checkout server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magnet_payments::{MockGateway, PaymentGateway, StripeGateway};
use magnet_server::{app, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize payments
    let gateway: Arc<dyn PaymentGateway> = match &config.stripe {
        Some(keys) => {
            tracing::info!("✓ Stripe configured");
            Arc::new(StripeGateway::new(&keys.secret_key, &keys.webhook_secret))
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - using mock gateway");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            Arc::new(MockGateway::new())
        }
    };
    if config.webhook_secret.is_none() {
        tracing::warn!("⚠ No webhook secret - /payments/webhook will reject events");
    }
    if config.admin_user_ids.is_empty() {
        tracing::info!("No admin users configured");
    }

    let state = AppState::in_memory(&config, gateway);
    let router = app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🧲 magnet-shop checkout running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  POST /payment-intent          - Open payment intent");
    tracing::info!("  POST /checkout/pending        - Save pending checkout");
    tracing::info!("  POST /orders/create           - Finalize order");
    tracing::info!("  GET  /orders                  - Order history");
    tracing::info!("  GET  /addresses               - Address book");
    tracing::info!("  POST /payments/webhook        - Gateway events");
    tracing::info!("");

    axum::serve(listener, router).await?;

    Ok(())
}
