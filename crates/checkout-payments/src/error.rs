//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// A required input is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Upstream gateway returned a non-success response. `message` is the
    /// gateway's own error text, empty when it gave none.
    #[error("Gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// Gateway could not be reached or answered with an unreadable body.
    /// `detail` is for logs only.
    #[error("Gateway unavailable: {detail}")]
    Unavailable { detail: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wrong HTTP verb for the operation
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Payment signature did not match the expected HMAC
    #[error("Invalid payment signature")]
    SignatureMismatch,
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    pub fn gateway(status: u16, message: impl Into<String>) -> Self {
        PaymentError::Gateway {
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        PaymentError::Unavailable {
            detail: detail.to_string(),
        }
    }

    /// HTTP status the endpoints answer with
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation(_) | PaymentError::SignatureMismatch => 400,
            PaymentError::MethodNotAllowed => 405,
            PaymentError::Gateway { .. } | PaymentError::Unavailable { .. } | PaymentError::Config(_) => {
                500
            }
        }
    }

    /// Upstream status code, if the error came from a gateway
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PaymentError::Gateway { status, .. } => Some(*status),
            PaymentError::Unavailable { .. } => Some(502),
            _ => None,
        }
    }

    /// Check if this error is retryable automatically.
    ///
    /// Nothing is: reads may be retried by the caller, creations are not idempotent
    /// unless an idempotency key was supplied.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Validation(msg) => msg,
            PaymentError::Gateway { .. } => "Payment processing failed. Please try again.",
            PaymentError::Unavailable { .. } => {
                "Payment service is unavailable right now. Please try again."
            }
            PaymentError::Config(_) => "Service configuration error.",
            PaymentError::MethodNotAllowed => "Method not allowed",
            PaymentError::SignatureMismatch => "Invalid payment signature",
        }
    }
}
