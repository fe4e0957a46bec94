//! `UpstreamConnector` / `UpstreamConnection` — abstraction over the
//! upstream message transport.
//!
//! The subscriber only needs to open a connection, send one text message and
//! read text messages until the connection ends. Keep-alive control frames are
//! the connection's business and never reach the subscriber.

use crate::error::StreamError;
use async_trait::async_trait;

/// Opens upstream connections.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Endpoint for logging. Must not expose credentials.
    fn endpoint(&self) -> &str;

    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn UpstreamConnection>, StreamError>;
}

/// A single open upstream connection.
#[async_trait]
pub trait UpstreamConnection: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), StreamError>;

    /// Wait for the next text message.
    ///
    /// Returns `None` once the peer has closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}
