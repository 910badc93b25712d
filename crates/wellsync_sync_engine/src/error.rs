//! Error types for the sync engine.

use thiserror::Error;
use wellsync_core::StoreError;
use wellsync_protocol::ProtocolError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a sync flow.
///
/// Every variant leaves local state exactly as it was before the flow
/// started.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The backend answered with a non-2xx status or a non-JSON body.
    #[error("backend responded {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// No response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The response was JSON but not the expected shape, or a request
    /// could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The engine is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Builds a transport error from a raw body, keeping at most
    /// `excerpt_len` characters.
    pub fn transport(status: u16, body: &[u8], excerpt_len: usize) -> Self {
        Self::Transport {
            status,
            body: String::from_utf8_lossy(body).chars().take(excerpt_len).collect(),
        }
    }

    /// Whether the failure is the expected, recoverable kind that callers
    /// report as "offline or sync failed" and retry later.
    pub fn is_offline(&self) -> bool {
        !matches!(self, SyncError::Config(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
