//! # magnet-core
//!
//! Domain model shared by the checkout server and the payment confirmation
//! client: carts priced in decimal major units, orders with their status
//! state machine, pending checkout snapshots, and the store contracts every
//! handler receives as an explicit dependency.
//!
//! ## Checkout data flow
//!
//! ```text
//! ┌────────┐   ┌────────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │  Cart  │──▶│ Intent Issuer  │──▶│ Confirmation     │──▶│   Order     │
//! │(client)│   │   (server)     │   │ Client (browser) │   │  Finalizer  │
//! └────────┘   └────────────────┘   └──────────────────┘   └──────┬──────┘
//!                                                                 ▼
//!                    ┌────────────────────┐               ┌─────────────┐
//!                    │ Webhook Reconciler │──────────────▶│ OrderStore  │
//!                    └────────────────────┘               └─────────────┘
//! ```

pub mod address;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod money;
pub mod order;
pub mod store;

pub use address::{Address, NewAddress};
pub use cart::{Cart, LineItem, MAX_CLIENT_PRICE};
pub use checkout::{CheckoutToken, PendingCheckout, PendingOrder, PENDING_ORDER_KEY};
pub use error::{CoreError, Result};
pub use order::{
    IntentStatus, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PaymentOutcome,
    PaymentStatus, PaymentTransaction, Transition,
};
pub use store::{
    AddressStore, Insertion, MemoryAddressStore, MemoryOrderStore, MemoryPendingCheckoutStore,
    OrderStore, PendingCheckoutStore,
};
