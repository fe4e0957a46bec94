//! `UpstreamSubscriber` — owns the upstream connection and its reconnect
//! state machine.

use crate::config::UpstreamConfig;
use crate::transport::{UpstreamConnection, UpstreamConnector};
use pumprelay_core::{ClassifiedEvent, EventClassifier, LogsNotification};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

/// Connection state of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamState {
    Disconnected,
    Connecting,
    /// Request sent, nothing received yet
    Subscribed,
    /// Frames are arriving
    Reading,
}

impl UpstreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Reading => "reading",
        }
    }
}

impl fmt::Display for UpstreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters snapshot for the subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberMetrics {
    pub frames_received: u64,
    /// Frames that were not a parseable notification (acks, garbage)
    pub frames_skipped: u64,
    pub events_classified: u64,
    pub notifications_unmatched: u64,
    pub connect_failures: u64,
    pub reconnections: u64,
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    QueueClosed,
    Disconnected(String),
}

/// Subscribes to program logs and forwards classified events.
///
/// # Usage
/// ```no_run
/// # async fn example() {
/// use pumprelay_stream::{UpstreamConfig, UpstreamSubscriber, WsConnector};
/// use std::sync::Arc;
/// use tokio::sync::mpsc::error::TrySendError;
/// use tokio::sync::{mpsc, watch};
///
/// let config = UpstreamConfig::default();
/// let connector = WsConnector::new("wss://...", config.connect_timeout(), config.pong_timeout());
/// let subscriber = Arc::new(UpstreamSubscriber::new(connector, config));
/// let (tx, _rx) = mpsc::channel(1024);
/// let (_stop, shutdown) = watch::channel(false);
/// tokio::spawn(async move { subscriber.run(tx, shutdown).await });
/// # }
/// ```
pub struct UpstreamSubscriber<C> {
    connector: C,
    config: UpstreamConfig,
    classifier: EventClassifier,
    state: watch::Sender<UpstreamState>,
    metrics: Mutex<SubscriberMetrics>,
}

impl<C: UpstreamConnector> UpstreamSubscriber<C> {
    pub fn new(connector: C, config: UpstreamConfig) -> Self {
        let classifier = EventClassifier::new(config.markers.clone());
        let (state, _) = watch::channel(UpstreamState::Disconnected);
        Self {
            connector,
            config,
            classifier,
            state,
            metrics: Mutex::new(SubscriberMetrics::default()),
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<UpstreamState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> UpstreamState {
        *self.state.borrow()
    }

    /// Returns a snapshot of current metrics.
    pub fn metrics(&self) -> SubscriberMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped) or the
    /// event receiver goes away. Reconnects forever otherwise.
    pub async fn run(
        &self,
        events: mpsc::Sender<ClassifiedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let endpoint = self.connector.endpoint();
        let request = self.config.subscription.to_text();

        while !*shutdown.borrow() {
            self.set_state(UpstreamState::Connecting);
            info!(url = %endpoint, "connecting to upstream");

            let connected = tokio::select! {
                res = self.connector.connect() => res,
                _ = shutdown.changed() => break,
            };

            let mut conn = match connected {
                Ok(conn) => conn,
                Err(e) => {
                    self.set_state(UpstreamState::Disconnected);
                    self.bump(|m| m.connect_failures += 1);
                    warn!(error = %e, "upstream connect failed, retrying in {:?}", self.config.connect_retry());
                    if pause(self.config.connect_retry(), &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let end = self
                .session(conn.as_mut(), &request, &events, &mut shutdown)
                .await;
            conn.close().await;
            self.set_state(UpstreamState::Disconnected);

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::QueueClosed => {
                    warn!("event queue closed, stopping upstream subscriber");
                    break;
                }
                SessionEnd::Disconnected(reason) => {
                    self.bump(|m| m.reconnections += 1);
                    warn!(
                        reason = %reason,
                        "disconnected from upstream, reconnecting in {:?}",
                        self.config.reconnect_delay()
                    );
                    if pause(self.config.reconnect_delay(), &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set_state(UpstreamState::Disconnected);
        info!("upstream subscriber stopped");
    }

    async fn session(
        &self,
        conn: &mut dyn UpstreamConnection,
        request: &str,
        events: &mpsc::Sender<ClassifiedEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        if let Err(e) = conn.send_text(request.to_owned()).await {
            return SessionEnd::Disconnected(format!("logsSubscribe not sent: {e}"));
        }
        self.set_state(UpstreamState::Subscribed);
        info!(mentions = ?self.config.subscription.mentions, "logsSubscribe sent");

        // Events the queue had no room for, oldest first. The socket keeps
        // being read (and pings answered) until this fills up.
        let mut backlog: VecDeque<ClassifiedEvent> = VecDeque::new();
        let limit = self.config.backlog_capacity.max(1);

        loop {
            let reading = backlog.len() < limit;
            let frame = tokio::select! {
                permit = events.reserve(), if !backlog.is_empty() => {
                    let Ok(permit) = permit else {
                        return SessionEnd::QueueClosed;
                    };
                    if let Some(event) = backlog.pop_front() {
                        permit.send(event);
                    }
                    continue;
                }
                frame = conn.next_text(), if reading => frame,
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            };

            let text = match frame {
                None => return SessionEnd::Disconnected("closed by peer".into()),
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                Some(Ok(text)) => text,
            };
            if self.current_state() != UpstreamState::Reading {
                self.set_state(UpstreamState::Reading);
            }

            let Some(event) = self.process(text) else {
                continue;
            };

            if !backlog.is_empty() {
                backlog.push_back(event);
            } else {
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => {
                        debug!("event queue full, holding events while reading");
                        backlog.push_back(event);
                    }
                    Err(TrySendError::Closed(_)) => return SessionEnd::QueueClosed,
                }
            }
            if backlog.len() == limit {
                warn!(held = limit, "event backlog full, pausing upstream reads");
            }
        }
    }

    /// Parse and classify one inbound frame.
    fn process(&self, text: String) -> Option<ClassifiedEvent> {
        self.bump(|m| m.frames_received += 1);

        let notification = match LogsNotification::parse(&text) {
            Ok(n) => n,
            Err(e) => {
                let preview: String = text.chars().take(120).collect();
                debug!(error = %e, "skipping non-notification frame: {preview}");
                self.bump(|m| m.frames_skipped += 1);
                return None;
            }
        };

        let value = notification.value();
        let Some(classification) = self.classifier.classify(&value.logs) else {
            self.bump(|m| m.notifications_unmatched += 1);
            return None;
        };

        debug!(
            kind = %classification.kind,
            signature = %value.signature,
            mint = %classification.payload.mint,
            destination = %classification.payload.destination,
            amount = classification.payload.amount(),
            "classified notification"
        );
        self.bump(|m| m.events_classified += 1);

        let signature = value.signature.clone();
        let slot = notification.slot();
        Some(ClassifiedEvent::new(classification, signature, slot, text))
    }

    fn set_state(&self, state: UpstreamState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "upstream state");
        }
    }

    fn bump(&self, f: impl FnOnce(&mut SubscriberMetrics)) {
        f(&mut self.metrics.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Sleep for `delay` unless shutdown is requested first. Returns `true` on
/// shutdown.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}
