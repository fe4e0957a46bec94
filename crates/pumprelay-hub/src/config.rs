//! Downstream hub configuration.

use crate::topic::TopicRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which connections receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    /// Connections subscribed to a topic found in the event's addresses
    #[default]
    Topic,
    /// Every open connection, subscribed or not
    All,
}

/// What is written to downstream sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamFormat {
    /// The upstream notification text, untouched
    #[default]
    Raw,
    /// A compact JSON summary of the classified event
    Classified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub topic: TopicRule,
    #[serde(default)]
    pub fanout: FanoutMode,
    #[serde(default)]
    pub format: DownstreamFormat,
    /// Per-connection outbound queue size; a full queue evicts the connection
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Upper bound for a single socket write
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_outbound_capacity() -> usize { 256 }
fn default_send_timeout_ms() -> u64 { 5_000 }

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            topic: TopicRule::default(),
            fanout: FanoutMode::default(),
            format: DownstreamFormat::default(),
            outbound_capacity: default_outbound_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_overrides() {
        let c: HubConfig = serde_yaml::from_str("fanout: all\nformat: classified\noutbound_capacity: 8\n").unwrap();
        assert_eq!(c.fanout, FanoutMode::All);
        assert_eq!(c.format, DownstreamFormat::Classified);
        assert_eq!(c.outbound_capacity, 8);
        assert_eq!(c.topic, TopicRule::default());
        assert_eq!(c.send_timeout(), Duration::from_secs(5));
    }
}
