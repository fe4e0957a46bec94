//! Error types for the payload decode step.

use thiserror::Error;

/// Reasons a log line does not yield a payload.
///
/// None of these are failures of the pipeline: most program log lines are not
/// payload carriers. The public decoder collapses them to `None`; the detailed
/// variant is available through [`crate::payload::try_decode_log_line`] for
/// diagnostics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log line carries no `Program data:` marker")]
    MissingMarker,

    #[error("payload is not valid base64: {reason}")]
    Base64 { reason: String },

    #[error("payload too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
}
