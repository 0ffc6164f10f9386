//! Set-update error handling
//!
//! Typed errors for calls to the set-update endpoint, with a classification
//! used to decide whether a failed write may be retried.

use thiserror::Error;

use crate::models::SetId;

/// Errors returned by a [`crate::client::SetUpdater`]
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Request never completed (connect failure, timeout, reset)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server rejected the session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Set belongs to another user
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Set does not exist on the server
    #[error("Set {0} not found on server")]
    NotFound(SetId),

    /// Any other non-success status
    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Server URL cannot carry set paths
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Id cannot be sent as a single path segment
    #[error("Set id '{0}' cannot be addressed on the server")]
    InvalidId(SetId),

    /// Success status but the body could not be understood
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Failure raised by a non-HTTP updater
    #[error("{0}")]
    Other(String),
}

impl UpdateError {
    /// Check if this error is worth retrying
    ///
    /// Transport failures and server-side (5xx) errors are transient; auth,
    /// missing sets and malformed bodies will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            UpdateError::Transport(_) => true,
            UpdateError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
