//! Error Types

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Fallback shown when the session endpoint gives no reason
pub const SESSION_FALLBACK_MESSAGE: &str = "Failed to create checkout session";

/// Client error types. `Clone` so one initialization failure can be observed by
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Required configuration (site id, API URL) absent
    #[error("Configuration error: {0}")]
    Config(String),

    /// External checkout script failed to load
    #[error("Checkout script failed to load: {0}")]
    Load(String),

    /// Backend endpoint answered with a non-success status. `upstream_status`
    /// is the gateway's status behind it, when the backend reported one.
    #[error("Backend error ({status}): {message}")]
    Backend {
        status: u16,
        message: String,
        upstream_status: Option<u16>,
    },

    /// Request never got an answer
    #[error("Network error: {0}")]
    Network(String),

    /// Session descriptor could not be obtained
    #[error("{0}")]
    Descriptor(String),

    /// Lifecycle event not valid in the current state
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    /// The attempt already holds a session descriptor
    #[error("A session descriptor was already issued for this attempt")]
    DescriptorAlreadyIssued,
}

impl ClientError {
    /// Gateway status behind a backend failure (404 for an unknown payment)
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ClientError::Backend { upstream_status, .. } => *upstream_status,
            _ => None,
        }
    }

    /// Message carried into a descriptor failure: the backend's reason if it gave one
    pub fn descriptor_message(&self) -> String {
        match self {
            ClientError::Backend { message, .. } if !message.is_empty() => message.clone(),
            ClientError::Descriptor(message) => message.clone(),
            _ => SESSION_FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Descriptor(message) => message.clone(),
            ClientError::Load(_) => {
                "The checkout could not be loaded. Please check your connection and try again."
                    .into()
            }
            _ => "Checkout is unavailable right now. Please try again.".into(),
        }
    }
}
