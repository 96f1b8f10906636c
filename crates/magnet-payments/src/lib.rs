//! # magnet-payments
//!
//! Payment side of the magnet shop checkout, built on Stripe Payment
//! Intents with embedded card entry:
//!
//! ```text
//! ┌──────────────┐ clientSecret ┌──────────────────┐ paymentIntentId ┌────────────────┐
//! │ IntentIssuer │─────────────▶│ Browser confirms │────────────────▶│ OrderFinalizer │
//! └──────────────┘              │ (maybe 3-D Sec.) │                 └────────────────┘
//!                               └──────────────────┘
//!                                   Stripe ──── signed events ────▶ WebhookReconciler
//! ```
//!
//! The browser may be sent off-site for authentication, so the finalizer can
//! be reached twice for one payment. Every path converges on a single order
//! per payment intent.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use magnet_payments::{IntentIssuer, IntentRequest, StripeGateway};
//!
//! let gateway = Arc::new(StripeGateway::new("sk_test_xxx", "whsec_xxx"));
//! let issuer = IntentIssuer::new(gateway);
//!
//! let ticket = issuer.issue(IntentRequest {
//!     cart,
//!     currency: "gbp".into(),
//!     metadata: HashMap::new(),
//! }, "user_123").await?;
//!
//! // Hand ticket.client_secret to the browser
//! ```

mod error;
mod finalizer;
mod gateway;
mod issuer;
mod webhook;

pub use error::{PaymentError, Result};
pub use finalizer::{FinalizeRequest, FinalizedOrder, OrderFinalizer};
pub use gateway::{
    ConfirmIntent, CreateIntent, MockGateway, PaymentGateway, PaymentIntent, StripeGateway,
    TEST_CARD_DECLINED, TEST_CARD_REQUIRES_ACTION, TEST_CARD_SUCCEEDS, USER_ID_METADATA_KEY,
};
pub use issuer::{IntentIssuer, IntentRequest, IntentTicket, PricedLine, Quote};
pub use webhook::{
    IntentSnapshot, ReconcileOutcome, SignatureVerifier, WebhookEvent, WebhookReconciler,
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};
