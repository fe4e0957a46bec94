//! Log-bundle classifier.
//!
//! One pass over the log lines of a single notification collects three
//! signals: the create marker, the last buy/sell marker, and the first
//! decodable payload. The decision table in [`Signals::decide`] turns them
//! into at most one [`EventKind`].

use crate::payload::{decode_log_line, DecodedPayload, PROGRAM_DATA_MARKER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Buy,
    Sell,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substrings that identify the interesting log lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMarkers {
    /// Present when the transaction initialises a new mint.
    #[serde(default = "default_create")]
    pub create: String,
    #[serde(default = "default_buy")]
    pub buy: String,
    #[serde(default = "default_sell")]
    pub sell: String,
    /// Substring a mint address must contain to be eligible for buy/sell.
    #[serde(default = "default_eligibility")]
    pub eligibility: String,
}

fn default_create() -> String { "InitializeMint".into() }
fn default_buy() -> String { "Buy".into() }
fn default_sell() -> String { "Sell".into() }
fn default_eligibility() -> String { "pump".into() }

impl Default for LogMarkers {
    fn default() -> Self {
        Self {
            create: default_create(),
            buy: default_buy(),
            sell: default_sell(),
            eligibility: default_eligibility(),
        }
    }
}

/// Buy or sell, whichever marker was seen last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

/// Signals accumulated over a bundle.
#[derive(Debug, Default)]
struct Signals {
    create: bool,
    side: Option<Side>,
    payload: Option<DecodedPayload>,
}

impl Signals {
    fn complete(&self) -> bool {
        self.create && self.side.is_some() && self.payload.is_some()
    }

    fn decide(self, markers: &LogMarkers) -> Option<Classification> {
        let payload = self.payload.filter(|p| !p.mint.is_empty())?;
        let eligible = payload.mint_contains(&markers.eligibility);

        let kind = match (self.create, self.side, eligible) {
            (true, _, _) => EventKind::Create,
            (false, Some(Side::Buy), true) => EventKind::Buy,
            (false, Some(Side::Sell), true) => EventKind::Sell,
            _ => return None,
        };
        Some(Classification { kind, payload })
    }
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: EventKind,
    pub payload: DecodedPayload,
}

/// Classifies log bundles with a fixed set of markers.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    markers: LogMarkers,
}

impl EventClassifier {
    pub fn new(markers: LogMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &LogMarkers {
        &self.markers
    }

    /// Classify the log lines of one notification.
    ///
    /// If both a buy and a sell marker appear, the one seen last decides.
    /// Payload lines are never scanned for markers.
    pub fn classify<S: AsRef<str>>(&self, logs: &[S]) -> Option<Classification> {
        let m = &self.markers;
        let mut signals = Signals::default();

        for line in logs.iter().map(AsRef::as_ref) {
            if line.contains(PROGRAM_DATA_MARKER) {
                if signals.payload.is_none() {
                    signals.payload = decode_log_line(line);
                }
            } else {
                if line.contains(m.buy.as_str()) {
                    signals.side = Some(Side::Buy);
                }
                if line.contains(m.sell.as_str()) {
                    signals.side = Some(Side::Sell);
                }
                if line.contains(m.create.as_str()) {
                    signals.create = true;
                }
            }

            if signals.complete() {
                break;
            }
        }

        signals.decide(m)
    }
}

/// Classify with the default markers.
pub fn classify<S: AsRef<str>>(logs: &[S]) -> Option<Classification> {
    EventClassifier::default().classify(logs)
}
