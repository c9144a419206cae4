// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the sync engine.

use atrium_store::{RecordId, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Timeout or transport failure while persisting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The persistence call exceeded the global transaction timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Connection-level failure (DNS, refused, reset, TLS, ...).
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Misuse of the temp-id namespace.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TempIdError {
    /// The id was never issued this session, or was already substituted.
    #[error("temp id {0} is not outstanding")]
    NotOutstanding(RecordId),
    /// A server-assigned id uses the temp-id form.
    #[error("server id {0} collides with the temp-id namespace")]
    ServerIdInTempNamespace(RecordId),
}

/// Everything that can go wrong around a transaction.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected before the transaction began; nothing was applied.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Timeout or transport failure during persist.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Non-success response carrying a message.
    #[error("server error: {message}")]
    Server {
        /// HTTP status, when the failure came from an HTTP response.
        status: Option<u16>,
        /// Message from the response envelope.
        message: String,
    },
    /// Local store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Temp-id substitution failed.
    #[error(transparent)]
    TempId(#[from] TempIdError),
}

impl SyncError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    /// Shorthand for a server failure without an HTTP status.
    pub fn server(message: impl Into<String>) -> Self {
        SyncError::Server {
            status: None,
            message: message.into(),
        }
    }

    /// Short line suitable for a toast body.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(NetworkError::Timeout(_)) => {
                "The server took too long to respond.".to_string()
            }
            SyncError::Network(NetworkError::Transport(_)) => {
                "Could not reach the server.".to_string()
            }
            SyncError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
