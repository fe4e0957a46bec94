//! # pumprelay-observability
//!
//! Structured logging for the relay. Text for terminals, JSON for log
//! shippers (ELK, Loki, CloudWatch). Levels are configurable per component:
//!
//! ```yaml
//! log:
//!   level: info
//!   json: true
//!   components:
//!     pumprelay-stream: debug
//! ```

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
