//! Downstream error types.

use crate::registry::ConnectionId;
use thiserror::Error;

/// Errors on a single downstream connection. They never affect other
/// connections.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("send timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("invalid client request: {0}")]
    InvalidRequest(String),
}

/// Rejections from [`crate::SubscriptionRegistry::subscribe`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

/// Why an event could not be queued for a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,

    #[error("connection closed")]
    Closed,
}
