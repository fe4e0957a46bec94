//! Wire types for the upstream `logsSubscribe` request and its notifications.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Program the relay watches by default (pump.fun bonding curve).
pub const DEFAULT_PROGRAM_ADDRESS: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// `logsSubscribe` request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsSubscribeRequest {
    /// Addresses passed as the `mentions` filter
    pub mentions: Vec<String>,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_commitment() -> String { "finalized".into() }
fn default_encoding() -> String { "jsonParsed".into() }

impl Default for LogsSubscribeRequest {
    fn default() -> Self {
        Self::new([DEFAULT_PROGRAM_ADDRESS])
    }
}

impl LogsSubscribeRequest {
    pub fn new(mentions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mentions: mentions.into_iter().map(Into::into).collect(),
            commitment: default_commitment(),
            encoding: default_encoding(),
        }
    }

    /// The JSON-RPC body sent once per successful connect.
    pub fn to_json(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": self.mentions },
                { "commitment": self.commitment, "encoding": self.encoding }
            ]
        })
    }

    pub fn to_text(&self) -> String {
        self.to_json().to_string()
    }
}

/// A `logsNotification` frame. Only the fields the relay reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsNotification {
    pub params: NotificationParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    pub result: NotificationResult,
    #[serde(default)]
    pub subscription: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationResult {
    #[serde(default)]
    pub context: Option<NotificationContext>,
    pub value: NotificationValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationContext {
    pub slot: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationValue {
    #[serde(default)]
    pub signature: String,
    /// Transaction error, `null` on success. Kept opaque.
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl LogsNotification {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn value(&self) -> &NotificationValue {
        &self.params.result.value
    }

    pub fn slot(&self) -> Option<u64> {
        self.params.result.context.as_ref().map(|c| c.slot)
    }
}
