//! Application State

use async_trait::async_trait;
use std::sync::Arc;

use checkout_payments::{
    ChargebeeClient, HostedCheckout, HostedCheckoutGateway, HostedCheckoutService, HostedPage,
    NewOrder, Order, OrderGateway, OrderService, Payment, PaymentError, RazorpayClient, Result,
};

/// Stand-in gateway for a backend whose credentials are absent.
/// Requests still validate; anything that would reach the gateway fails with `Config`.
pub struct MissingConfig(pub String);

#[async_trait]
impl OrderGateway for MissingConfig {
    async fn create_order(&self, _order: NewOrder) -> Result<Order> {
        Err(PaymentError::Config(self.0.clone()))
    }

    async fn fetch_payment(&self, _payment_id: &str) -> Result<Payment> {
        Err(PaymentError::Config(self.0.clone()))
    }
}

#[async_trait]
impl HostedCheckoutGateway for MissingConfig {
    async fn checkout_new(&self, _checkout: &HostedCheckout) -> Result<HostedPage> {
        Err(PaymentError::Config(self.0.clone()))
    }

    async fn retrieve(&self, _hosted_page_id: &str) -> Result<HostedPage> {
        Err(PaymentError::Config(self.0.clone()))
    }
}

/// Shared application state. Gateway clients are read-only per request.
#[derive(Clone)]
pub struct AppState {
    /// Order-based gateway (Razorpay)
    pub orders: Arc<OrderService<Arc<dyn OrderGateway>>>,

    /// Hosted-checkout gateway (Chargebee)
    pub hosted: Arc<HostedCheckoutService<Arc<dyn HostedCheckoutGateway>>>,

    /// Key secret for payment signature verification (None if not configured)
    pub key_secret: Option<Arc<str>>,

    pub orders_configured: bool,
    pub hosted_configured: bool,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderGateway>,
        hosted: Arc<dyn HostedCheckoutGateway>,
        key_secret: Option<&str>,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(orders)),
            hosted: Arc::new(HostedCheckoutService::new(hosted)),
            key_secret: key_secret.map(Arc::from),
            orders_configured: true,
            hosted_configured: true,
        }
    }

    /// Build gateways from the environment, disabling any that are not configured
    pub fn from_env() -> Self {
        let (orders, key_secret, orders_configured): (Arc<dyn OrderGateway>, _, _) =
            match RazorpayClient::from_env() {
                Ok(client) => {
                    let secret: Arc<str> = Arc::from(client.key_secret());
                    (Arc::new(client), Some(secret), true)
                }
                Err(e) => {
                    tracing::warn!("⚠ Order gateway not configured: {}", e);
                    (Arc::new(MissingConfig(e.to_string())), None, false)
                }
            };

        let (hosted, hosted_configured): (Arc<dyn HostedCheckoutGateway>, _) =
            match ChargebeeClient::from_env() {
                Ok(client) => (Arc::new(client), true),
                Err(e) => {
                    tracing::warn!("⚠ Hosted checkout not configured: {}", e);
                    (Arc::new(MissingConfig(e.to_string())), false)
                }
            };

        Self {
            orders: Arc::new(OrderService::new(orders)),
            hosted: Arc::new(HostedCheckoutService::new(hosted)),
            key_secret,
            orders_configured,
            hosted_configured,
        }
    }
}
