//! Upstream subscriber configuration.

use pumprelay_core::{LogMarkers, LogsSubscribeRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the upstream connection. The endpoint itself (which embeds
/// the credential) is given to the connector, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// `logsSubscribe` filter and commitment
    #[serde(default)]
    pub subscription: LogsSubscribeRequest,
    /// Delay between failed connection attempts
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,
    /// Delay before reconnecting after an established connection dropped
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Upper bound for a single connect attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound for answering a keep-alive ping
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Capacity of the queue between subscriber and broadcaster
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// Events held by the reader while the queue is full. Reading pauses
    /// once this many are waiting.
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
    #[serde(default)]
    pub markers: LogMarkers,
}

fn default_connect_retry_ms() -> u64 { 5_000 }
fn default_reconnect_delay_ms() -> u64 { 2_000 }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_pong_timeout_ms() -> u64 { 5_000 }
fn default_event_queue_capacity() -> usize { 1_024 }
fn default_backlog_capacity() -> usize { 1_024 }

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            subscription: LogsSubscribeRequest::default(),
            connect_retry_ms: default_connect_retry_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            event_queue_capacity: default_event_queue_capacity(),
            backlog_capacity: default_backlog_capacity(),
            markers: LogMarkers::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    /// Watch a different set of program addresses.
    pub fn with_mentions(mut self, mentions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.subscription.mentions = mentions.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_relay_timings() {
        let c = UpstreamConfig::default();
        assert_eq!(c.connect_retry(), Duration::from_secs(5));
        assert_eq!(c.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(c.pong_timeout(), Duration::from_secs(5));
        assert_eq!(c.backlog_capacity, 1_024);
        assert_eq!(c.subscription.commitment, "finalized");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let c: UpstreamConfig = serde_yaml::from_str(
            "reconnect_delay_ms: 250\nsubscription:\n  mentions: [\"Prog111\"]\n",
        )
        .unwrap();
        assert_eq!(c.reconnect_delay_ms, 250);
        assert_eq!(c.connect_retry_ms, 5_000);
        assert_eq!(c.subscription.mentions, vec!["Prog111".to_string()]);
        assert_eq!(c.subscription.encoding, "jsonParsed");
        assert_eq!(c.markers, LogMarkers::default());
    }

    #[test]
    fn with_mentions_replaces_filter() {
        let c = UpstreamConfig::default().with_mentions(["A", "B"]);
        assert_eq!(c.subscription.mentions.len(), 2);
    }
}
