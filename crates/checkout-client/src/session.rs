//! Checkout session descriptors
//!
//! A descriptor is minted by the backend once per checkout attempt and handed to
//! the widget. [`DescriptorSource`] is consumed by its single fetch, so a
//! descriptor cannot be requested twice from the same source.

use async_trait::async_trait;
use checkout_payments::HostedSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ClientError, Result};

/// Type tag of a descriptor for a new checkout
pub const CHECKOUT_NEW: &str = "checkout_new";

/// State tag of a freshly created descriptor
pub const STATE_CREATED: &str = "created";

/// Parameters of one checkout attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    pub plan_price_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CheckoutParams {
    pub fn new(plan_price_id: impl Into<String>) -> Self {
        Self {
            plan_price_id: plan_price_id.into(),
            customer_email: None,
            customer_name: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_customer(mut self, email: impl Into<String>, name: Option<String>) -> Self {
        self.customer_email = Some(email.into());
        self.customer_name = name;
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Descriptor in the shape the checkout widget expects
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub state: String,
    pub embed: bool,
}

impl From<HostedSession> for SessionDescriptor {
    fn from(session: HostedSession) -> Self {
        Self {
            id: session.hosted_page_id,
            kind: CHECKOUT_NEW.into(),
            url: session.hosted_page_url,
            state: STATE_CREATED.into(),
            embed: true,
        }
    }
}

/// Backend that mints hosted sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self, params: &CheckoutParams) -> Result<HostedSession>;
}

/// One-shot descriptor provider handed to the widget
pub struct DescriptorSource {
    provider: Arc<dyn SessionProvider>,
    params: CheckoutParams,
}

impl DescriptorSource {
    pub fn new(provider: Arc<dyn SessionProvider>, params: CheckoutParams) -> Self {
        Self { provider, params }
    }

    pub fn params(&self) -> &CheckoutParams {
        &self.params
    }

    /// Request a descriptor from the backend. Failures carry the backend's reason.
    pub async fn fetch(self) -> Result<SessionDescriptor> {
        match self.provider.create_session(&self.params).await {
            Ok(session) => {
                tracing::debug!(hosted_page_id = %session.hosted_page_id, "Session descriptor issued");
                Ok(session.into())
            }
            Err(e) => {
                tracing::error!(error = %e, plan_price_id = %self.params.plan_price_id, "Session descriptor request failed");
                Err(ClientError::Descriptor(e.descriptor_message()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_shape() {
        let descriptor = SessionDescriptor::from(HostedSession {
            hosted_page_id: "hp_1".into(),
            hosted_page_url: "https://acme-test.chargebee.com/pages/v3/hp_1/".into(),
        });

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "hp_1",
                "type": "checkout_new",
                "url": "https://acme-test.chargebee.com/pages/v3/hp_1/",
                "state": "created",
                "embed": true,
            })
        );
    }

    #[test]
    fn test_params_wire_shape() {
        let params = CheckoutParams::new("pro-INR-Yearly").with_user_id("user_7");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "planPriceId": "pro-INR-Yearly", "userId": "user_7" })
        );
    }
}
