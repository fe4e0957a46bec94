//! Classified events and their downstream JSON form.

use crate::classifier::{Classification, EventKind};
use crate::payload::DecodedPayload;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An upstream notification that passed classification.
///
/// `raw` is the notification text exactly as received, shared so that the
/// fan-out does not copy it per connection.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub payload: DecodedPayload,
    /// Transaction signature (base58)
    pub signature: String,
    /// Slot from the notification context, if present
    pub slot: Option<u64>,
    pub raw: Arc<str>,
}

impl ClassifiedEvent {
    pub fn new(
        classification: Classification,
        signature: impl Into<String>,
        slot: Option<u64>,
        raw: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            kind: classification.kind,
            payload: classification.payload,
            signature: signature.into(),
            slot,
            raw: raw.into(),
        }
    }

    /// Addresses a downstream topic can match against.
    pub fn addresses(&self) -> [&str; 2] {
        [&self.payload.mint, &self.payload.destination]
    }

    /// The derived JSON form of this event.
    pub fn to_message(&self) -> ClassifiedMessage {
        ClassifiedMessage {
            kind: self.kind,
            signature: self.signature.clone(),
            slot: self.slot,
            amount: self.payload.amount(),
            lamports: self.payload.lamports,
            mint: self.payload.mint.clone(),
            destination: self.payload.destination.clone(),
        }
    }
}

/// Downstream message body when the relay forwards classified events instead
/// of raw notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedMessage {
    pub kind: EventKind,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub slot: Option<u64>,
    /// Whole SOL, truncated
    pub amount: u64,
    pub lamports: u64,
    pub mint: String,
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassifiedEvent {
        ClassifiedEvent::new(
            Classification {
                kind: EventKind::Sell,
                payload: DecodedPayload {
                    lamports: 3_500_000_000,
                    mint: "2qEHjDLDLbuBgRYvsxhc5D6uDWAivNFZGan56P1tpump".into(),
                    destination: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".into(),
                },
            },
            "5sig",
            Some(42),
            "{\"raw\":true}",
        )
    }

    #[test]
    fn message_carries_truncated_amount() {
        let msg = sample().to_message();
        assert_eq!(msg.amount, 3);
        assert_eq!(msg.lamports, 3_500_000_000);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "sell");
        assert_eq!(json["slot"], 42);
        assert_eq!(json["signature"], "5sig");
    }

    #[test]
    fn slot_omitted_when_unknown() {
        let mut event = sample();
        event.slot = None;
        let json = serde_json::to_value(event.to_message()).unwrap();
        assert!(json.get("slot").is_none());
    }

    #[test]
    fn addresses_in_payload_order() {
        let event = sample();
        let [mint, dest] = event.addresses();
        assert!(mint.ends_with("pump"));
        assert!(dest.starts_with("9Wz"));
        assert_eq!(&*event.raw, "{\"raw\":true}");
    }
}
