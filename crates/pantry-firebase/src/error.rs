//! Error types for the Firebase backends

use pantry_core::{PantryError, RemoteError};
use thiserror::Error;

/// Firebase REST failures
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Request could not be sent or its body read
    #[error("{operation}: transport error: {source}")]
    Transport {
        /// Operation name
        operation: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Service answered with a non-success status
    #[error("{operation}: HTTP {status}: {body}")]
    Status {
        /// Operation name
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response body, trimmed
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("{operation}: unexpected response: {message}")]
    Response {
        /// Operation name
        operation: String,
        /// What was wrong with the body
        message: String,
    },

    /// Firestore value that has no JSON counterpart
    #[error("unsupported Firestore value: {0}")]
    Value(String),

    /// Base URL or client settings are unusable
    #[error("invalid endpoint configuration: {0}")]
    Endpoint(String),
}

impl FirebaseError {
    pub(crate) fn transport(operation: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.to_string(),
            source,
        }
    }

    pub(crate) fn response(operation: &str, message: impl Into<String>) -> Self {
        Self::Response {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<FirebaseError> for PantryError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::Transport { operation, source } => {
                let remote = RemoteError::new(operation, source.to_string());
                match source.status() {
                    Some(status) => remote.with_status(status.as_u16()).into(),
                    None => remote.into(),
                }
            }
            FirebaseError::Status {
                operation,
                status,
                body,
            } => RemoteError::new(operation, body).with_status(status).into(),
            FirebaseError::Response { operation, message } => {
                PantryError::Decode(format!("{operation}: {message}"))
            }
            FirebaseError::Value(msg) => PantryError::Decode(msg),
            FirebaseError::Endpoint(msg) => PantryError::Config(msg),
        }
    }
}
