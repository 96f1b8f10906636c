//! # magnet-client
//!
//! Payment confirmation client for the magnet shop checkout page.
//!
//! A checkout may leave the page for 3-D Secure and come back on a fresh
//! page load, so the order snapshot is stashed in a `PendingOrderVault`
//! before the card is confirmed, and the order is created from that
//! snapshot on whichever path finishes the payment.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use magnet_client::{CheckoutClient, CheckoutOutcome, GatewayConfirmer, HttpOrderApi, LocalVault};
//!
//! let api = HttpOrderApi::new("https://shop.example", session_token);
//! let client = CheckoutClient::new(api, confirmer, LocalVault::new(data_dir));
//!
//! let ticket = client.begin(cart, "gbp").await?;
//! match client.submit(&ticket, pending_order, "pm_card_visa", return_url).await? {
//!     CheckoutOutcome::Completed { order_id } => show_confirmation(order_id),
//!     CheckoutOutcome::Redirect { url } => navigate(url),
//!     CheckoutOutcome::Processing { order_id } => show_pending(order_id),
//! }
//!
//! // Later, on the return page:
//! let outcome = client.resume_after_redirect(current_url).await?;
//! ```

mod api;
mod checkout;
mod confirm;
mod error;
mod vault;

pub use api::{HttpOrderApi, OrderApi};
pub use checkout::{CheckoutClient, CheckoutOutcome, CHECKOUT_TOKEN_PARAM};
pub use confirm::{Confirmation, GatewayConfirmer, PaymentConfirmer};
pub use error::{ClientError, Result};
pub use vault::{LocalVault, MemoryVault, PendingOrderVault, ServerVault};
