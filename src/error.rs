//! Error types for the load drivers

use thiserror::Error;
use uuid::Uuid;

use crate::client::ClientError;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent settings; fatal before any worker starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection, session, destination, send or receive failure; ends the worker
    #[error("Transport error: {0}")]
    Transport(#[from] ClientError),

    /// A single message could not be acknowledged or committed; the loop continues
    #[error("Handling error for message {message_id}: {source}")]
    Handling {
        message_id: Uuid,
        #[source]
        source: ClientError,
    },
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = Error::configuration("batch size must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error: batch size must be at least 1"
        );
    }

    #[test]
    fn test_from_client_error() {
        let err: Error = ClientError::Closed("session").into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("session is closed"));
    }

    #[test]
    fn test_handling_error_display() {
        let id = Uuid::new_v4();
        let err = Error::Handling {
            message_id: id,
            source: ClientError::Closed("session"),
        };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
