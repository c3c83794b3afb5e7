//! # checkout-payments
//!
//! Gateway clients and services behind the checkout endpoints.
//!
//! ## Gateways
//!
//! ### 1. Order-based gateway (Razorpay)
//!
//! **Flow:** server creates an order → browser widget collects payment →
//! payment status is fetched (and its signature verified) by id
//!
//! ```text
//! ┌─────────────┐  create   ┌──────────────┐  fetch / verify  ┌─────────────┐
//! │  Your Site  │──────────▶│    Order     │◀─────────────────│  Your Site  │
//! │  (pricing)  │           │   Gateway    │                  │  (success)  │
//! └─────────────┘           └──────────────┘                  └─────────────┘
//! ```
//!
//! ### 2. Hosted-checkout gateway (Chargebee)
//!
//! **Flow:** server mints a one-time hosted page → user is redirected into it →
//! gateway redirects back to the return page
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Hosted Page    │────▶│  Your Site  │
//! │  (pricing)  │     │  (gateway UI)   │     │  (return)   │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{CreateOrderRequest, OrderService, RazorpayClient};
//!
//! let orders = OrderService::new(RazorpayClient::from_env()?);
//! let order = orders
//!     .create_order(CreateOrderRequest::new(499_900, "INR", "Pro Plan"))
//!     .await?;
//! ```

mod chargebee;
mod error;
mod hosted;
mod order;
mod razorpay;
mod signature;

pub use chargebee::ChargebeeClient;
pub use error::{PaymentError, Result};
pub use hosted::{
    HostedCheckout, HostedCheckoutGateway, HostedCheckoutRequest, HostedCheckoutService,
    HostedPage, HostedSession,
};
pub use order::{
    payment_id_from_path, CreateOrderRequest, IdempotencyCache, DEFAULT_IDEMPOTENCY_CAPACITY,
    DEFAULT_IDEMPOTENCY_TTL, NewOrder, Order, OrderGateway,
    OrderNotes, OrderService, Payment, PAYMENT_PATH_PLACEHOLDER,
};
pub use razorpay::RazorpayClient;
pub use signature::{sign_payment, verify_payment_signature, PaymentVerification};
