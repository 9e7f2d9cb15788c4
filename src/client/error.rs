//! Error types for the messaging client capability

use thiserror::Error;

/// Result type for messaging client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Transport-level failures raised by a [`MessagingClient`](super::MessagingClient)
/// implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection could not be established or was refused
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A named resource (connection factory, destination) could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The destination is not valid for the requested operation
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// The message selector could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The client id is already in use by another connection
    #[error("Client id '{0}' is already in use")]
    ClientIdInUse(String),

    /// A durable subscription is already active
    #[error("Durable subscription '{0}' already has an active subscriber")]
    SubscriptionInUse(String),

    /// Operation attempted on a closed connection, session or endpoint
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Operation is not permitted in the current session mode
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_selector_display() {
        let err = ClientError::InvalidSelector {
            selector: "color =".to_string(),
            reason: "missing value".to_string(),
        };
        assert!(err.to_string().contains("color ="));
        assert!(err.to_string().contains("missing value"));
    }

    #[test]
    fn test_closed_display() {
        let err = ClientError::Closed("session");
        assert_eq!(err.to_string(), "session is closed");
    }
}
