//! `WsConnector` — tokio-tungstenite implementation of the upstream transport.
//!
//! # Usage
//! ```no_run
//! use pumprelay_stream::ws::WsConnector;
//! use std::time::Duration;
//!
//! let connector = WsConnector::new(
//!     "wss://mainnet.helius-rpc.com/?api-key=YOUR_KEY",
//!     Duration::from_secs(10),
//!     Duration::from_secs(5),
//! );
//! ```

use crate::error::StreamError;
use crate::transport::{UpstreamConnection, UpstreamConnector};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections to a Solana RPC endpoint.
pub struct WsConnector {
    url: String,
    redacted: String,
    connect_timeout: Duration,
    pong_timeout: Duration,
}

impl WsConnector {
    /// `url` may embed a credential (e.g. an `api-key` query parameter); it is
    /// kept out of logs.
    pub fn new(url: impl Into<String>, connect_timeout: Duration, pong_timeout: Duration) -> Self {
        let url = url.into();
        let redacted = redact(&url);
        Self {
            url,
            redacted,
            connect_timeout,
            pong_timeout,
        }
    }
}

#[async_trait]
impl UpstreamConnector for WsConnector {
    fn endpoint(&self) -> &str {
        &self.redacted
    }

    async fn connect(&self) -> Result<Box<dyn UpstreamConnection>, StreamError> {
        let failed = |reason: String| StreamError::ConnectionFailed {
            url: self.redacted.clone(),
            reason,
        };

        let (stream, response) = time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| failed(format!("no handshake within {:?}", self.connect_timeout)))?
            .map_err(|e| failed(e.to_string()))?;

        info!(url = %self.redacted, status = %response.status(), "WebSocket connected");

        Ok(Box::new(WsConnection {
            stream,
            pong_timeout: self.pong_timeout,
        }))
    }
}

/// An open upstream WebSocket.
struct WsConnection {
    stream: WsStream,
    pong_timeout: Duration,
}

impl WsConnection {
    async fn pong(&mut self, data: Vec<u8>) -> Result<(), StreamError> {
        let ms = self.pong_timeout.as_millis() as u64;
        time::timeout(self.pong_timeout, self.stream.send(Message::Pong(data)))
            .await
            .map_err(|_| StreamError::Timeout { what: "pong", ms })?
            .map_err(|e| StreamError::Send(e.to_string()))
    }
}

#[async_trait]
impl UpstreamConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.stream.next().await? {
                Err(e) => return Some(Err(StreamError::Receive(e.to_string()))),
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("dropping non-UTF-8 binary frame"),
                },
                Ok(Message::Ping(data)) => {
                    // Answer inline so a busy read loop cannot starve keep-alives
                    if let Err(e) = self.pong(data).await {
                        return Some(Err(e));
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "WebSocket closed by server");
                    return None;
                }
                Ok(_) => {} // pong / raw frame
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Strip query string and userinfo from a URL for logging.
pub fn redact(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_drops_api_key() {
        assert_eq!(
            redact("wss://mainnet.helius-rpc.com/?api-key=secret"),
            "wss://mainnet.helius-rpc.com/"
        );
        assert_eq!(redact("ws://user:pw@127.0.0.1:9000/x"), "ws://127.0.0.1:9000/x");
        assert_eq!(redact("not a url"), "<invalid url>");
    }

    #[tokio::test]
    async fn connect_failure_is_reported_without_credential() {
        // Port 9 (discard) on localhost is not expected to speak WebSocket
        let connector = WsConnector::new(
            "ws://127.0.0.1:9/?api-key=secret",
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let err = connector.connect().await.err().unwrap();
        let msg = err.to_string();
        assert!(msg.starts_with("RPC connection failed"), "{msg}");
        assert!(!msg.contains("secret"));
    }
}
