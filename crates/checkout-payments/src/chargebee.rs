//! Chargebee Hosted Pages client
//!
//! Implements [`HostedCheckoutGateway`] over the Chargebee v2 REST API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::hosted::{HostedCheckout, HostedCheckoutGateway, HostedPage};

/// Chargebee client wrapper
#[derive(Clone)]
pub struct ChargebeeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    public_base_url: Option<String>,
}

impl ChargebeeClient {
    /// Create a new client for `site` (the `<site>.chargebee.com` subdomain)
    pub fn new(site: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("https://{site}.chargebee.com"),
            api_key: api_key.to_string(),
            public_base_url: None,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let site = std::env::var("CHARGEBEE_SITE")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::Config("CHARGEBEE_SITE not set".into()))?;
        let api_key = std::env::var("CHARGEBEE_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::Config("CHARGEBEE_API_KEY not set".into()))?;

        let mut client = Self::new(&site, &api_key);
        if let Ok(base_url) = std::env::var("CHARGEBEE_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        if let Ok(public_base_url) = std::env::var("PUBLIC_BASE_URL") {
            client = client.with_public_base_url(public_base_url);
        }
        Ok(client)
    }

    /// Point the client at another API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Public URL of the site, used for the redirect and cancel pages.
    /// Ignored for localhost, where the gateway falls back to its own pages.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.public_base_url = (!url.is_empty() && !url.contains("localhost"))
            .then(|| url.trim_end_matches('/').to_string());
        self
    }

    fn form_params(&self, checkout: &HostedCheckout) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("subscription_items[item_price_id][0]", checkout.plan_price_id.clone()),
            ("subscription_items[quantity][0]", "1".to_string()),
        ];

        if let Some(email) = &checkout.customer_email {
            params.push(("customer[email]", email.clone()));
            if let Some(name) = &checkout.customer_name {
                params.push(("customer[first_name]", name.clone()));
            }
        }

        if let Some(user_id) = &checkout.user_id {
            params.push(("pass_thru_content", user_id.clone()));
        }

        if let Some(base) = &self.public_base_url {
            params.push(("redirect_url", format!("{base}/checkout-success")));
            params.push(("cancel_url", format!("{base}/pricing")));
        }

        params
    }

    async fn read_page(response: reqwest::Response) -> Result<HostedPage> {
        let status = response.status();
        if status.is_success() {
            let envelope: HostedPageEnvelope = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Malformed gateway response");
                PaymentError::unavailable(e)
            })?;
            return Ok(envelope.hosted_page);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ChargebeeErrorBody>(&body) {
            Ok(b) => b.message,
            Err(_) => {
                tracing::warn!(status = status.as_u16(), body = %body, "Unrecognized gateway error body");
                String::new()
            }
        };

        Err(PaymentError::gateway(status.as_u16(), message))
    }
}

fn transport_error(e: &reqwest::Error) -> PaymentError {
    tracing::error!(error = %e, "Gateway request failed");
    PaymentError::unavailable(e)
}

#[derive(Deserialize)]
struct HostedPageEnvelope {
    hosted_page: HostedPage,
}

#[derive(Deserialize)]
struct ChargebeeErrorBody {
    message: String,
}

#[async_trait]
impl HostedCheckoutGateway for ChargebeeClient {
    async fn checkout_new(&self, checkout: &HostedCheckout) -> Result<HostedPage> {
        let response = self
            .http
            .post(format!(
                "{}/api/v2/hosted_pages/checkout_new_for_items",
                self.base_url
            ))
            .basic_auth(&self.api_key, Some(""))
            .form(&self.form_params(checkout))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::read_page(response).await
    }

    async fn retrieve(&self, hosted_page_id: &str) -> Result<HostedPage> {
        let response = self
            .http
            .get(format!("{}/api/v2/hosted_pages/{hosted_page_id}", self.base_url))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::read_page(response).await
    }
}
