//! # pumprelay-hub
//!
//! Downstream side of the relay.
//!
//! - [`SubscriptionRegistry`] — the single shared index of open connections
//!   and their topics; every lock lives inside it
//! - [`Broadcaster`] — drains the classified-event queue and fans each event
//!   out to the matching connections' outbound queues
//! - [`ConnectionHandler`] — one task per downstream connection: reads topic
//!   declarations, writes queued events, deregisters on failure
//!
//! The transport is abstracted by [`MessageConnection`]; the server binary
//! adapts axum WebSockets to it.

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod topic;

pub use broadcaster::{BroadcastMetrics, Broadcaster, FanoutReport};
pub use config::{DownstreamFormat, FanoutMode, HubConfig};
pub use connection::{ClientRequest, ConnectionHandler, MessageConnection};
pub use error::{DeliveryError, HubError, SubscribeError};
pub use registry::{ConnectionHandle, ConnectionId, SubscriptionRegistry};
pub use topic::TopicRule;
