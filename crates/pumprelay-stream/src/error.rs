//! Upstream transport errors.

use thiserror::Error;

/// Errors on the upstream connection. All of them are transient: the
/// subscriber logs them and reconnects.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("RPC connection failed: {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("stream closed unexpectedly")]
    Closed,

    #[error("{what} timed out after {ms}ms")]
    Timeout { what: &'static str, ms: u64 },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
