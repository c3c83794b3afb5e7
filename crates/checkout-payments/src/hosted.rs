//! Hosted Checkout
//!
//! Requests one-time hosted checkout pages from the hosted-checkout gateway and
//! looks up their state after the user returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// A hosted checkout page as issued by the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedPage {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub embed: bool,
}

impl HostedPage {
    /// Whether the customer finished the checkout on this page
    pub fn is_completed(&self) -> bool {
        matches!(self.state.as_str(), "succeeded" | "acknowledged")
    }
}

/// Incoming hosted-checkout request, before validation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedCheckoutRequest {
    #[serde(default)]
    pub plan_price_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Validated checkout parameters handed to the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedCheckout {
    pub plan_price_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub user_id: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl HostedCheckoutRequest {
    pub fn new(plan_price_id: impl Into<String>) -> Self {
        Self {
            plan_price_id: Some(plan_price_id.into()),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<HostedCheckout> {
        let plan_price_id = non_empty(self.plan_price_id.as_ref())
            .ok_or_else(|| PaymentError::validation("planPriceId is required"))?;

        Ok(HostedCheckout {
            plan_price_id,
            customer_email: non_empty(self.customer_email.as_ref()),
            customer_name: non_empty(self.customer_name.as_ref()),
            user_id: non_empty(self.user_id.as_ref()),
        })
    }
}

/// Session handed back to the client: enough to build a checkout descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedSession {
    pub hosted_page_id: String,
    pub hosted_page_url: String,
}

/// Hosted-checkout payment gateway
#[async_trait]
pub trait HostedCheckoutGateway: Send + Sync {
    /// Issue a new hosted checkout page
    async fn checkout_new(&self, checkout: &HostedCheckout) -> Result<HostedPage>;

    /// Retrieve a hosted page by id
    async fn retrieve(&self, hosted_page_id: &str) -> Result<HostedPage>;
}

#[async_trait]
impl<G: HostedCheckoutGateway + ?Sized> HostedCheckoutGateway for std::sync::Arc<G> {
    async fn checkout_new(&self, checkout: &HostedCheckout) -> Result<HostedPage> {
        (**self).checkout_new(checkout).await
    }

    async fn retrieve(&self, hosted_page_id: &str) -> Result<HostedPage> {
        (**self).retrieve(hosted_page_id).await
    }
}

/// Hosted checkout service over a hosted-checkout gateway
pub struct HostedCheckoutService<G> {
    gateway: G,
}

impl<G: HostedCheckoutGateway> HostedCheckoutService<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Create a hosted session. Each call issues a new page; sessions are never reused.
    pub async fn create_session(&self, request: HostedCheckoutRequest) -> Result<HostedSession> {
        let checkout = request.validate()?;

        tracing::info!(
            plan_price_id = %checkout.plan_price_id,
            has_customer = checkout.customer_email.is_some(),
            "Creating hosted checkout"
        );

        let page = self.gateway.checkout_new(&checkout).await.inspect_err(|e| {
            tracing::error!(error = %e, plan_price_id = %checkout.plan_price_id, "Hosted checkout failed");
        })?;

        if page.url.is_empty() {
            return Err(PaymentError::unavailable("No hosted page URL returned"));
        }

        tracing::info!(hosted_page_id = %page.id, "Hosted checkout created");

        Ok(HostedSession {
            hosted_page_id: page.id,
            hosted_page_url: page.url,
        })
    }

    /// Look up a hosted page's current state
    pub async fn hosted_page(&self, hosted_page_id: &str) -> Result<HostedPage> {
        let hosted_page_id = hosted_page_id.trim();
        if hosted_page_id.is_empty() {
            return Err(PaymentError::validation("Hosted page ID is required"));
        }

        self.gateway.retrieve(hosted_page_id).await
    }
}
