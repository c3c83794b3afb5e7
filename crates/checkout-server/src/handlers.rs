//! HTTP Handlers
//!
//! Every endpoint is routed for all verbs and checks its own, so a wrong verb
//! is answered with a JSON 405 before the body is parsed or a gateway is called.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use checkout_payments::{
    payment_id_from_path, CreateOrderRequest, HostedCheckoutRequest, HostedSession, Payment,
    PaymentError, PaymentVerification,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub order_gateway_configured: bool,
    pub hosted_checkout_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            upstream_status: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HostedPageStatusResponse {
    pub id: String,
    pub state: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn status_of(err: &PaymentError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert an error into a JSON body. `context` is the generic message shown for
/// gateway and configuration failures.
fn reject(err: &PaymentError, context: &str) -> ApiError {
    let body = match err {
        PaymentError::Validation(msg) => ErrorResponse::new(msg.clone()),
        PaymentError::Gateway { status, message } => {
            tracing::error!(upstream_status = status, "{}: {}", context, message);
            ErrorResponse {
                error: context.to_string(),
                message: (!message.is_empty()).then(|| message.clone()),
                upstream_status: Some(*status),
            }
        }
        PaymentError::Unavailable { detail } => {
            tracing::error!("{}: {}", context, detail);
            ErrorResponse {
                error: context.to_string(),
                message: Some(err.user_message().to_string()),
                upstream_status: err.upstream_status(),
            }
        }
        PaymentError::Config(reason) => {
            tracing::error!("{}: {}", context, reason);
            ErrorResponse {
                error: context.to_string(),
                message: Some(err.user_message().to_string()),
                upstream_status: None,
            }
        }
        PaymentError::MethodNotAllowed | PaymentError::SignatureMismatch => {
            ErrorResponse::new(err.user_message())
        }
    };

    (status_of(err), Json(body))
}

fn require_method(method: &Method, expected: &Method) -> Result<(), ApiError> {
    if method == expected {
        Ok(())
    } else {
        Err(reject(&PaymentError::MethodNotAllowed, ""))
    }
}

/// Parse a JSON body; an empty body is treated as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        reject(&PaymentError::validation("Invalid JSON body"), "")
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(
    State(state): State<AppState>,
    method: Method,
) -> ApiResult<HealthResponse> {
    require_method(&method, &Method::GET)?;

    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        order_gateway_configured: state.orders_configured,
        hosted_checkout_configured: state.hosted_configured,
    }))
}

/// Create an order on the order-based gateway
pub async fn create_order(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> ApiResult<CreateOrderResponse> {
    require_method(&method, &Method::POST)?;
    let request: CreateOrderRequest = parse_body(&body)?;

    let order = state
        .orders
        .create_order(request)
        .await
        .map_err(|e| reject(&e, "Failed to create order"))?;

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        receipt: order.receipt,
    }))
}

/// Fetch a payment by the id trailing the request path
pub async fn get_payment(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> ApiResult<Payment> {
    require_method(&method, &Method::GET)?;
    let payment_id = payment_id_from_path(uri.path());

    let payment = state
        .orders
        .get_payment(payment_id)
        .await
        .map_err(|e| reject(&e, "Failed to fetch payment details"))?;

    Ok(Json(payment))
}

/// Verify the signature handed to the browser after a successful payment
pub async fn verify_payment(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<VerifyPaymentResponse>, (StatusCode, Json<serde_json::Value>)> {
    let to_value = |(status, Json(body)): ApiError| {
        (status, Json(serde_json::to_value(body).unwrap_or_default()))
    };

    require_method(&method, &Method::POST).map_err(to_value)?;
    let request: PaymentVerification = parse_body(&body).map_err(to_value)?;

    let secret = state.key_secret.as_deref().ok_or_else(|| {
        to_value(reject(
            &PaymentError::Config("RAZORPAY_KEY_SECRET not set".into()),
            "Failed to verify payment",
        ))
    })?;

    match request.verify(secret) {
        Ok((order_id, payment_id)) => {
            tracing::info!(order_id = %order_id, payment_id = %payment_id, "Payment verified");
            Ok(Json(VerifyPaymentResponse {
                status: "success",
                message: "Payment verified successfully",
                payment_id: Some(payment_id),
                order_id: Some(order_id),
            }))
        }
        Err(PaymentError::SignatureMismatch) => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "failure",
                "message": "Invalid payment signature",
            })),
        )),
        Err(e) => Err(to_value(reject(&e, "Failed to verify payment"))),
    }
}

/// Mint a one-time hosted checkout page
pub async fn create_hosted_checkout(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> ApiResult<HostedSession> {
    require_method(&method, &Method::POST)?;
    let request: HostedCheckoutRequest = parse_body(&body)?;

    let session = state.hosted.create_session(request).await.map_err(|e| match &e {
        // The client surfaces `error` verbatim in its checkout error callback
        PaymentError::Gateway { status, message } if !message.is_empty() => {
            tracing::error!(upstream_status = status, "Hosted checkout error: {}", message);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(message.clone())))
        }
        PaymentError::Gateway { .. } | PaymentError::Unavailable { .. } => {
            tracing::error!(error = %e, "Hosted checkout error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create checkout session")),
            )
        }
        PaymentError::Config(reason) => {
            tracing::error!("Hosted checkout error: {}", reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Checkout is not configured")),
            )
        }
        _ => reject(&e, "Failed to create checkout session"),
    })?;

    Ok(Json(session))
}

/// Current state of a hosted page, used to confirm a redirect back from the gateway
pub async fn hosted_page_status(
    State(state): State<AppState>,
    method: Method,
    Path(hosted_page_id): Path<String>,
) -> ApiResult<HostedPageStatusResponse> {
    require_method(&method, &Method::GET)?;

    let page = state
        .hosted
        .hosted_page(&hosted_page_id)
        .await
        .map_err(|e| reject(&e, "Failed to fetch checkout status"))?;

    Ok(Json(HostedPageStatusResponse {
        id: page.id,
        state: page.state,
    }))
}
