//! # pumprelay-core
//!
//! Pure building blocks of the relay pipeline: the `Program data:` payload
//! decoder, the log-bundle classifier, and the wire types shared by the
//! upstream subscriber and the downstream hub. Nothing in this crate does I/O.

pub mod classifier;
pub mod error;
pub mod event;
pub mod notification;
pub mod payload;

pub use classifier::{classify, Classification, EventClassifier, EventKind, LogMarkers};
pub use error::DecodeError;
pub use event::{ClassifiedEvent, ClassifiedMessage};
pub use notification::{
    LogsNotification, LogsSubscribeRequest, NotificationValue, DEFAULT_PROGRAM_ADDRESS,
};
pub use payload::{decode_log_line, decode_payload, DecodedPayload, LAMPORTS_PER_SOL};
