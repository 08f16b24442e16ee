// Error handling module
// Defines the session error taxonomy shared by the lifecycle and guarded calls

use thiserror::Error;

/// Maximum length for response bodies carried inside errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors that can occur while establishing or using a session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Create or Refresh failed (transport failure, non-2xx, or bad payload)
    #[error("Connection failed during {operation}: {message}")]
    Connection {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Refresh was attempted without a stored refresh token
    #[error("Refresh token is missing")]
    MissingCredential,

    /// Session state could not be written to or removed from storage
    #[error("Failed to persist session state at {location}: {source}")]
    Persistence {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisted session state could not be decoded
    #[error("Malformed persisted session state: {0}")]
    MalformedState(#[source] serde_json::Error),

    /// The server kept rejecting credentials after recovery
    #[error("Authentication failed after {attempts} recovery attempt(s): {status} - {body}")]
    AuthFailureExhausted { status: u16, attempts: u32, body: String },

    /// Non-2xx response from a guarded call
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    /// A 2xx response whose body is not valid JSON
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build a connection error for a lifecycle operation that got a non-2xx status
    pub(crate) fn connection_status(operation: &'static str, status: u16, body: &str) -> Self {
        SessionError::Connection {
            operation,
            status: Some(status),
            message: format!("{} - {}", status, Self::truncate_body(body)),
        }
    }

    /// Errors after which the recovery path falls back from Refresh to Create
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Connection { .. } | SessionError::MissingCredential
        )
    }

    /// Returns `true` for errors caused by rejected or missing credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SessionError::AuthFailureExhausted { .. } | SessionError::MissingCredential
        )
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Connection { status, .. } => *status,
            SessionError::AuthFailureExhausted { status, .. } | SessionError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
