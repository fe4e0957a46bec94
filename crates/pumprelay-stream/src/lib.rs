//! # pumprelay-stream
//!
//! Upstream side of the relay. Owns the WebSocket connection to the Solana
//! node, sends the `logsSubscribe` request, classifies every notification and
//! hands matches to the fan-out stage through a bounded queue.
//!
//! ## Architecture
//! ```text
//! UpstreamConnector::connect()  (tokio-tungstenite, or a test double)
//!       │
//!       ▼
//! UpstreamSubscriber  Disconnected → Connecting → Subscribed → Reading ┐
//!       │                    ▲                                         │
//!       │                    └──────────── fixed delay ────────────────┘
//!       ▼
//! EventClassifier (pumprelay-core)
//!       │
//!       ▼
//! mpsc::Sender<ClassifiedEvent>   ← bounded, overflow held in a bounded backlog
//! ```

pub mod config;
pub mod error;
pub mod subscriber;
pub mod transport;
pub mod ws;

pub use config::UpstreamConfig;
pub use error::StreamError;
pub use subscriber::{SubscriberMetrics, UpstreamState, UpstreamSubscriber};
pub use transport::{UpstreamConnection, UpstreamConnector};
pub use ws::WsConnector;
