//! Per-connection task for downstream clients.
//!
//! Clients declare interest by sending a JSON string (the topic) or an object
//! `{"subscribe": "<topic>"}` / `{"unsubscribe": "<topic>"}`. Anything else
//! ends the connection.

use crate::config::HubConfig;
use crate::error::{HubError, SubscribeError};
use crate::registry::{ConnectionId, SubscriptionRegistry};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, info, warn};

/// A duplex text-message connection to a downstream client.
#[async_trait]
pub trait MessageConnection: Send {
    /// Next text frame. `None` once the client has gone away.
    async fn recv_text(&mut self) -> Option<Result<String, HubError>>;

    async fn send_text(&mut self, text: &str) -> Result<(), HubError>;

    async fn close(&mut self);
}

/// A parsed client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Subscribe(String),
    Unsubscribe(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRequest {
    Topic(String),
    Subscribe { subscribe: String },
    Unsubscribe { unsubscribe: String },
}

impl ClientRequest {
    pub fn parse(text: &str) -> Result<Self, HubError> {
        let wire: WireRequest = serde_json::from_str(text)
            .map_err(|e| HubError::InvalidRequest(e.to_string()))?;
        Ok(match wire {
            WireRequest::Topic(topic) | WireRequest::Subscribe { subscribe: topic } => {
                Self::Subscribe(topic)
            }
            WireRequest::Unsubscribe { unsubscribe } => Self::Unsubscribe(unsubscribe),
        })
    }
}

enum Step {
    Closed,
    Outbound(Option<Arc<str>>),
    Inbound(Option<Result<String, HubError>>),
}

/// Serves downstream connections against a shared registry.
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: SubscriptionRegistry,
    config: HubConfig,
}

impl ConnectionHandler {
    pub fn new(registry: SubscriptionRegistry, config: HubConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Serve one connection until the client leaves, a write fails, or the
    /// registry closes it. The connection is always deregistered and closed
    /// on return.
    pub async fn serve<C: MessageConnection>(&self, mut conn: C) {
        let (handle, mut outbound) = self.registry.register(self.config.outbound_capacity);
        let id = handle.id();
        info!(connection = %id, "downstream connected");

        let reason = loop {
            let step = tokio::select! {
                _ = handle.closed() => Step::Closed,
                msg = outbound.recv() => Step::Outbound(msg),
                frame = conn.recv_text() => Step::Inbound(frame),
            };

            match step {
                Step::Closed | Step::Outbound(None) => break "closed by relay".to_string(),
                Step::Outbound(Some(msg)) => {
                    if let Err(e) = self.write(&mut conn, &msg).await {
                        break e.to_string();
                    }
                }
                Step::Inbound(None) => break "closed by client".to_string(),
                Step::Inbound(Some(Err(e))) => break e.to_string(),
                Step::Inbound(Some(Ok(text))) => {
                    if let Err(e) = self.handle_frame(&mut conn, id, &text).await {
                        break e.to_string();
                    }
                }
            }
        };

        self.registry.remove_connection(id);
        conn.close().await;
        info!(connection = %id, reason = %reason, "downstream disconnected");
    }

    async fn handle_frame<C: MessageConnection>(
        &self,
        conn: &mut C,
        id: ConnectionId,
        text: &str,
    ) -> Result<(), HubError> {
        match ClientRequest::parse(text)? {
            ClientRequest::Subscribe(topic) => match self.registry.subscribe(&topic, id) {
                Ok(()) => {
                    debug!(connection = %id, topic = %topic, "subscribed");
                    self.write(conn, &format!("Successfully subscribed to {topic}"))
                        .await
                }
                Err(SubscribeError::InvalidTopic { topic, reason }) => {
                    warn!(connection = %id, topic = %topic, reason = %reason, "ignoring invalid topic");
                    Ok(())
                }
                Err(e @ SubscribeError::UnknownConnection(_)) => {
                    Err(HubError::InvalidRequest(e.to_string()))
                }
            },
            ClientRequest::Unsubscribe(topic) => {
                if !self.registry.unsubscribe(&topic, id) {
                    debug!(connection = %id, topic = %topic, "unsubscribe for a topic not held, ignoring");
                    return Ok(());
                }
                debug!(connection = %id, topic = %topic, "unsubscribed");
                self.write(conn, &format!("Successfully unsubscribed from {topic}"))
                    .await
            }
        }
    }

    async fn write<C: MessageConnection>(&self, conn: &mut C, text: &str) -> Result<(), HubError> {
        let limit = self.config.send_timeout();
        match time::timeout(limit, conn.send_text(text)).await {
            Ok(res) => res,
            Err(_) => Err(HubError::Timeout {
                ms: limit.as_millis() as u64,
            }),
        }
    }
}
