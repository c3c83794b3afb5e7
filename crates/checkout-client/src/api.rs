//! API Client
//!
//! Thin client for the checkout endpoints. Non-success answers become
//! [`ClientError::Backend`] carrying the body's `error` string.

use async_trait::async_trait;
use checkout_payments::{HostedSession, Payment};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::resolver::RedirectVerifier;
use crate::session::{CheckoutParams, SessionProvider};

/// Order request for the order-based gateway.
///
/// The idempotency key is generated once per request value; sending the same
/// value again (a retry) cannot create a second order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub amount: u64,
    pub currency: String,
    pub plan_name: String,
    pub idempotency_key: String,
}

impl OrderRequest {
    pub fn new(amount: u64, currency: impl Into<String>, plan_name: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            plan_name: plan_name.into(),
            idempotency_key: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Order as returned by the create-order endpoint
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
}

/// Successful signature verification
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub status: String,
    pub payment_id: String,
    pub order_id: String,
}

/// Current state of a hosted page
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HostedPageStatus {
    pub id: String,
    pub state: String,
}

impl HostedPageStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self.state.as_str(), "succeeded" | "acknowledged")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    upstream_status: Option<u16>,
}

/// Client for the checkout backend
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::Network(e.to_string()));
        }

        let (message, upstream_status) = match response.json::<ErrorBody>().await {
            // Verification failures answer with `message` only
            Ok(body) => (body.error.or(body.message).unwrap_or_default(), body.upstream_status),
            Err(_) => (String::new(), None),
        };

        Err(ClientError::Backend {
            status: status.as_u16(),
            message,
            upstream_status,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Self::read(response).await
    }

    /// Create an order on the order-based gateway
    pub async fn create_order(&self, order: &OrderRequest) -> Result<CreatedOrder> {
        self.send(self.http.post(self.url("create-order")).json(order)).await
    }

    /// Fetch a payment's status. Safe to retry.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        self.send(self.http.get(self.url(&format!("get-payment/{payment_id}"))))
            .await
    }

    /// Verify the signature the payment widget handed back
    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<VerifiedPayment> {
        let body = serde_json::json!({
            "razorpay_order_id": order_id,
            "razorpay_payment_id": payment_id,
            "razorpay_signature": signature,
        });
        self.send(self.http.post(self.url("verify-payment")).json(&body)).await
    }

    /// Mint a hosted checkout session
    pub async fn create_hosted_session(&self, params: &CheckoutParams) -> Result<HostedSession> {
        self.send(self.http.post(self.url("hosted-checkout")).json(params))
            .await
    }

    /// Look up a hosted page's state
    pub async fn hosted_page_status(&self, hosted_page_id: &str) -> Result<HostedPageStatus> {
        self.send(self.http.get(self.url(&format!("hosted-checkout/{hosted_page_id}"))))
            .await
    }
}

#[async_trait]
impl SessionProvider for BackendClient {
    async fn create_session(&self, params: &CheckoutParams) -> Result<HostedSession> {
        self.create_hosted_session(params).await
    }
}

#[async_trait]
impl RedirectVerifier for BackendClient {
    async fn is_completed(&self, hosted_page_id: &str) -> Result<bool> {
        Ok(self.hosted_page_status(hosted_page_id).await?.is_completed())
    }
}
