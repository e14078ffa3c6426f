//! Error types for Pantry Core
//!
//! Provides error handling for:
//! - Form validation and duplicate submissions
//! - Camera device access
//! - Remote store failures, deadlines and cancellation
//! - Configuration problems

use std::fmt;

/// Main pantry error type
#[derive(Debug, thiserror::Error)]
pub enum PantryError {
    /// Required field missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Raw quantity input matches the stored quantity
    #[error("This quantity already exists! ({name}: {quantity})")]
    DuplicateSubmission {
        /// Item name
        name: String,
        /// Stored quantity as rendered
        quantity: String,
    },

    /// Camera permission denied or device unavailable
    #[error("camera unavailable: {0}")]
    DeviceAccess(String),

    /// Operation not valid in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Remote store or blob store failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Remote call exceeded its deadline
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        /// Operation name
        operation: String,
        /// Deadline in milliseconds
        duration_ms: u64,
    },

    /// Remote call abandoned because its affordance went away
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation name
        operation: String,
    },

    /// Stored document could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl PantryError {
    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Remote(e) => e.is_transient(),
            _ => false,
        }
    }

    /// User-visible notice for this error, if any
    ///
    /// Device and cancellation errors are log-only; everything else the user
    /// can act on produces a notice.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Validation(_) | Self::DuplicateSubmission { .. } => {
                Some(Notice::blocking(self.to_string()))
            }
            Self::Remote(_) | Self::Timeout { .. } | Self::Decode(_) | Self::Config(_) => {
                Some(Notice::error(self.to_string()))
            }
            Self::DeviceAccess(_) | Self::InvalidState(_) | Self::Cancelled { .. } => None,
        }
    }
}

/// Failure reported by a remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Operation name
    pub operation: String,
    /// HTTP status, if the service answered
    pub status: Option<u16>,
    /// Message from the service or transport
    pub message: String,
}

impl RemoteError {
    /// Create remote error
    #[inline]
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: None,
            message: message.into(),
        }
    }

    /// With HTTP status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Transport failures, throttling and 5xx are transient
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(s) => s == 429 || s >= 500,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failed ({status}): {}", self.operation, self.message),
            None => write!(f, "{} failed: {}", self.operation, self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Must be acknowledged before continuing
    Blocking,
    /// Banner for failed remote work
    Error,
}

/// Message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub message: String,
}

impl Notice {
    /// Blocking alert
    #[inline]
    #[must_use]
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            message: message.into(),
        }
    }

    /// Error banner
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
