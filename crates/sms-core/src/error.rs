//! Error types for the SMS dispatch system
//!
//! Every failure path in the core returns one of these variants. Each variant
//! knows the status code the caller-facing layer reports for it.

use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the SMS dispatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input (phone number, message text, callback payload)
    #[error("{0}")]
    InvalidInput(String),

    /// The destination phone is blacklisted
    #[error("Phone number has been blacklisted")]
    Blacklisted,

    /// Callback referenced an unknown message identifier
    #[error("Message with the provided message_id does not exist")]
    NotFound(String),

    /// Callback for a message that is not waiting on a delivery outcome
    #[error("Message is not in a sending state")]
    NotSending(String),

    /// Callback carried a status token outside the accepted vocabulary
    #[error("Status has an unsupported value")]
    UnsupportedStatus(String),

    /// Every registered provider failed for one dispatch
    #[error("All messaging providers are currently unavailable")]
    ProvidersUnavailable {
        /// Number of providers that were tried
        attempts: usize,
    },

    /// A provider assigned an identifier that is already stored
    #[error("Duplicate message identifier: {0}")]
    DuplicateMessageId(String),

    /// Outbound transport failure for a single provider call
    #[error("Transport error ({provider}): {message}")]
    Transport {
        /// Provider endpoint
        provider: String,
        /// Error message
        message: String,
    },

    /// Persistence failures
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error for a message identifier
    pub fn not_found(message_id: impl Into<String>) -> Self {
        Self::NotFound(message_id.into())
    }

    /// Create a "not in a sending state" error for a message identifier
    pub fn not_sending(message_id: impl Into<String>) -> Self {
        Self::NotSending(message_id.into())
    }

    /// Create an unsupported status error for a callback token
    pub fn unsupported_status(token: impl Into<String>) -> Self {
        Self::UnsupportedStatus(token.into())
    }

    /// Create a transport error
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Status code reported to the caller for this error
    ///
    /// Collaborator failures that never reach the caller in normal operation
    /// (store, I/O, configuration) map to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) | Error::NotSending(_) | Error::UnsupportedStatus(_) => 400,
            Error::Blacklisted => 403,
            Error::NotFound(_) => 404,
            Error::ProvidersUnavailable { .. } => 503,
            Error::DuplicateMessageId(_)
            | Error::Transport { .. }
            | Error::Store(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Other(_) => 500,
        }
    }

    /// Whether the error is a rejection of the request rather than a fault
    pub fn is_rejection(&self) -> bool {
        self.status_code() < 500 || matches!(self, Error::ProvidersUnavailable { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(Error::invalid_input("Message is required").status_code(), 400);
        assert_eq!(Error::Blacklisted.status_code(), 403);
        assert_eq!(Error::not_found("abc").status_code(), 404);
        assert_eq!(Error::not_sending("abc").status_code(), 400);
        assert_eq!(Error::unsupported_status("unknown").status_code(), 400);
        assert_eq!(
            Error::ProvidersUnavailable { attempts: 2 }.status_code(),
            503
        );
        assert_eq!(Error::store("disk full").status_code(), 500);
    }

    #[test]
    fn test_descriptions_are_caller_facing() {
        assert_eq!(
            Error::Blacklisted.to_string(),
            "Phone number has been blacklisted"
        );
        assert_eq!(
            Error::ProvidersUnavailable { attempts: 3 }.to_string(),
            "All messaging providers are currently unavailable"
        );
        assert_eq!(
            Error::not_found("id-1").to_string(),
            "Message with the provided message_id does not exist"
        );
        assert_eq!(
            Error::invalid_input("Phone number is required").to_string(),
            "Phone number is required"
        );
    }

    #[test]
    fn test_rejections_vs_faults() {
        assert!(Error::Blacklisted.is_rejection());
        assert!(Error::ProvidersUnavailable { attempts: 1 }.is_rejection());
        assert!(!Error::store("boom").is_rejection());
    }
}
