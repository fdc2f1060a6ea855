//! Client error types

use thiserror::Error;

/// How an error is surfaced to the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inline on the form.
    Validation,
    /// Blocking alert, protected pages redirect to login.
    Auth,
    /// "Not found" page state.
    NotFound,
    /// Retryable alert; local state is preserved.
    Network,
}

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the request body
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credential
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique field already taken
    #[error("{0}")]
    Conflict(String),

    /// Server failed to handle the request
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Transport failure, including timeouts
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) | ClientError::Conflict(_) => ErrorKind::Validation,
            ClientError::Unauthorized(_) | ClientError::Forbidden(_) => ErrorKind::Auth,
            ClientError::NotFound(_) => ErrorKind::NotFound,
            ClientError::Server { .. }
            | ClientError::Network(_)
            | ClientError::InvalidResponse(_) => ErrorKind::Network,
        }
    }

    /// Message shown to the shopper.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(msg)
            | ClientError::Conflict(msg)
            | ClientError::NotFound(msg) => msg.clone(),
            ClientError::Unauthorized(msg) if !msg.is_empty() => msg.clone(),
            ClientError::Unauthorized(_) => "Please log in to continue".to_string(),
            ClientError::Forbidden(_) => "You are not allowed to do that".to_string(),
            ClientError::Server { .. } | ClientError::InvalidResponse(_) => {
                "Something went wrong, please try again".to_string()
            }
            ClientError::Network(err) if err.is_timeout() => {
                "The server took too long to respond, please try again".to_string()
            }
            ClientError::Network(_) => "Network error, please check your connection".to_string(),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
