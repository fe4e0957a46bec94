//! Topic validation and address matching.

use crate::error::SubscribeError;
use serde::{Deserialize, Serialize};

/// Shape a client topic must have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    /// Exact topic length in characters
    #[serde(default = "default_length")]
    pub length: usize,
    /// Substring every topic must contain
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_length() -> usize { 32 }
fn default_marker() -> String { "pump".into() }

impl Default for TopicRule {
    fn default() -> Self {
        Self {
            length: default_length(),
            marker: default_marker(),
        }
    }
}

impl TopicRule {
    pub fn validate(&self, topic: &str) -> Result<(), SubscribeError> {
        let invalid = |reason: String| SubscribeError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        };

        let len = topic.chars().count();
        if len != self.length {
            return Err(invalid(format!("expected {} characters, got {len}", self.length)));
        }
        if !topic.contains(self.marker.as_str()) {
            return Err(invalid(format!("missing '{}'", self.marker)));
        }
        Ok(())
    }

    /// Every substring of `address` that could be a valid topic.
    ///
    /// A subscription to topic `T` matches an address when `T` occurs inside
    /// it, so looking up these windows finds all matching topics.
    pub fn windows<'a>(&self, address: &'a str) -> Vec<&'a str> {
        if self.length == 0 || !address.is_ascii() || address.len() < self.length {
            return Vec::new();
        }
        (0..=address.len() - self.length)
            .map(|start| &address[start..start + self.length])
            .filter(|w| w.contains(self.marker.as_str()))
            .collect()
    }
}
