//! Checkout HTTP Server
//!
//! Axum-based server exposing the order, payment and hosted-checkout endpoints.
//! Each request is handled independently; gateway clients are shared read-only.

mod handlers;
mod state;

use axum::{
    routing::any,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{
    create_hosted_checkout, create_order, get_payment, health_check, hosted_page_status,
    verify_payment,
};
use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", any(health_check))

        // Order-based gateway
        .route("/api/create-order", any(create_order))
        .route("/api/get-payment", any(get_payment))
        .route("/api/get-payment/{payment_id}", any(get_payment))
        .route("/api/verify-payment", any(verify_payment))

        // Hosted-checkout gateway
        .route("/api/hosted-checkout", any(create_hosted_checkout))
        .route("/api/hosted-checkout/{hosted_page_id}", any(hosted_page_status))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let state = AppState::from_env();

    if state.orders_configured {
        tracing::info!("✓ Order gateway configured");
    } else {
        tracing::warn!("  Set RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET in .env");
    }
    if state.hosted_configured {
        tracing::info!("✓ Hosted checkout configured");
    } else {
        tracing::warn!("  Set CHARGEBEE_SITE and CHARGEBEE_API_KEY in .env");
    }

    let app = app(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("checkout server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                     - Health check");
    tracing::info!("  POST /api/create-order           - Create order");
    tracing::info!("  GET  /api/get-payment/{{id}}       - Fetch payment");
    tracing::info!("  POST /api/verify-payment         - Verify payment signature");
    tracing::info!("  POST /api/hosted-checkout        - Create hosted checkout");
    tracing::info!("  GET  /api/hosted-checkout/{{id}}   - Hosted checkout status");

    axum::serve(listener, app).await?;

    Ok(())
}
