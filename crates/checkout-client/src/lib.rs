//! # checkout-client
//!
//! Client-side checkout orchestration against the checkout backend.
//!
//! ```text
//! CheckoutController ──begin──▶ SessionBroker ──ensure_initialized──▶ WidgetHost
//!        │                           │
//!        │                           └──open(DescriptorSource)──▶ CheckoutWidget
//!        │                                         │ fetch (once)
//!        │                                         ▼
//!        │                                   BackendClient ──▶ POST /api/hosted-checkout
//!        ▼
//!   Succeeded | Cancelled | Failed
//! ```
//!
//! After a redirect-based checkout, [`PostRedirectResolver`] turns the return
//! URL into what the page should show.

pub mod api;
pub mod broker;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod session;
pub mod widget;

pub use api::{BackendClient, CreatedOrder, HostedPageStatus, OrderRequest, VerifiedPayment};
pub use broker::{CheckoutCallbacks, SessionBroker};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use lifecycle::{CheckoutAttempt, CheckoutController, CheckoutEvent, CheckoutState};
pub use resolver::{PostRedirectResolver, RedirectParams, RedirectVerifier, RedirectView};
pub use session::{CheckoutParams, DescriptorSource, SessionDescriptor, SessionProvider};
pub use widget::{CheckoutOutcome, CheckoutReporter, CheckoutWidget, PendingCheckout, WidgetHandle, WidgetHost};
