//! Razorpay Orders API client
//!
//! Implements [`OrderGateway`] over the Razorpay REST API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::order::{NewOrder, Order, OrderGateway, Payment};

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

/// Razorpay client wrapper
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    /// Create a new Razorpay client
    pub fn new(key_id: &str, key_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let key_id = std::env::var("RAZORPAY_KEY_ID")
            .map_err(|_| PaymentError::Config("RAZORPAY_KEY_ID not set".into()))?;
        let key_secret = std::env::var("RAZORPAY_KEY_SECRET")
            .map_err(|_| PaymentError::Config("RAZORPAY_KEY_SECRET not set".into()))?;

        let client = Self::new(&key_id, &key_secret);
        Ok(match std::env::var("RAZORPAY_BASE_URL") {
            Ok(base_url) => client.with_base_url(base_url),
            Err(_) => client,
        })
    }

    /// Point the client at another API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Key secret, used to verify payment signatures
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Malformed gateway response");
                    PaymentError::unavailable(e)
                });
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<RazorpayErrorBody>(&body) {
            Ok(b) => b.error.description,
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
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Deserialize)]
struct RazorpayErrorDetail {
    #[serde(default)]
    description: String,
}

/// Order entity as returned by Razorpay
#[derive(Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: u64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

#[async_trait]
impl OrderGateway for RazorpayClient {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&order)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let created: RazorpayOrder = Self::read(response).await?;

        Ok(Order {
            id: created.id,
            amount: created.amount,
            currency: created.currency,
            receipt: created.receipt.unwrap_or(order.receipt),
            notes: order.notes,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Payment> {
        tracing::debug!(payment_id = %payment_id, "Fetching payment");

        let response = self
            .http
            .get(format!("{}/v1/payments/{payment_id}", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderNotes;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn new_order() -> NewOrder {
        NewOrder {
            amount: 499_900,
            currency: "INR".into(),
            receipt: "receipt_1700000000000".into(),
            notes: OrderNotes {
                plan: "Pro Plan".into(),
                created_at: "2026-01-01T00:00:00+00:00".into(),
                idempotency_key: None,
            },
        }
    }

    #[tokio::test]
    async fn test_create_order_posts_to_orders_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "amount": 499_900,
                "currency": "INR",
                "receipt": "receipt_1700000000000",
                "notes": { "plan": "Pro Plan" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_EKwxwAgItmmXdp",
                "entity": "order",
                "amount": 499_900,
                "currency": "INR",
                "receipt": "receipt_1700000000000",
                "status": "created",
                "notes": { "plan": "Pro Plan" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RazorpayClient::new("rzp_test_key", "secret").with_base_url(server.uri());
        let order = client.create_order(new_order()).await.unwrap();

        assert_eq!(order.id, "order_EKwxwAgItmmXdp");
        assert_eq!(order.amount, 499_900);
        assert_eq!(order.receipt, "receipt_1700000000000");
        assert_eq!(order.notes.plan, "Pro Plan");
    }

    #[tokio::test]
    async fn test_fetch_payment_not_found_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "The id provided does not exist"
                }
            })))
            .mount(&server)
            .await;

        let client = RazorpayClient::new("k", "s").with_base_url(server.uri());
        let err = client.fetch_payment("pay_missing").await.unwrap_err();

        assert_eq!(err, PaymentError::gateway(404, "The id provided does not exist"));
    }

    #[tokio::test]
    async fn test_fetch_payment_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_29QQoUBi66xm2f"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_29QQoUBi66xm2f",
                "entity": "payment",
                "amount": 499_900,
                "currency": "INR",
                "status": "captured",
                "method": "card",
                "email": "gaurav.kumar@example.com",
                "contact": "+919000090000",
                "created_at": 1_400_826_750
            })))
            .mount(&server)
            .await;

        let client = RazorpayClient::new("k", "s").with_base_url(server.uri());
        let payment = client.fetch_payment("pay_29QQoUBi66xm2f").await.unwrap();

        assert_eq!(payment.status, "captured");
        assert_eq!(payment.method, "card");
        assert_eq!(payment.contact.as_deref(), Some("+919000090000"));
        assert_eq!(payment.created_at, 1_400_826_750);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_keeps_detail_internal() {
        let client = RazorpayClient::new("k", "s").with_base_url("http://127.0.0.1:1");
        let err = client.create_order(new_order()).await.unwrap_err();

        assert!(matches!(err, PaymentError::Unavailable { .. }), "{err:?}");
        assert_eq!(err.upstream_status(), Some(502));
        assert!(!err.user_message().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = RazorpayClient::new("k", "s").with_base_url(server.uri());
        let err = client.fetch_payment("pay_1").await.unwrap_err();

        assert!(matches!(err, PaymentError::Unavailable { .. }), "{err:?}");
        assert_eq!(err.upstream_status(), Some(502));
    }

    #[tokio::test]
    async fn test_unrecognized_error_body_is_not_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
            .mount(&server)
            .await;

        let client = RazorpayClient::new("k", "s").with_base_url(server.uri());
        let err = client.fetch_payment("pay_1").await.unwrap_err();

        assert_eq!(err, PaymentError::gateway(503, ""));
    }
}


