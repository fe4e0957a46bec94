//! Decoder for the fixed binary payload carried by `Program data:` log lines.
//!
//! Layout of the base64-decoded buffer (little-endian):
//!
//! ```text
//! [0..8)    u64   amount in lamports
//! [8..40)   32 B  mint address
//! [40..72)  32 B  destination address
//! ```
//!
//! Buffers may be longer than 72 bytes; trailing bytes are ignored.

use crate::error::DecodeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Marker that precedes the base64 payload in a program log line.
pub const PROGRAM_DATA_MARKER: &str = "Program data:";

/// Minimum decoded buffer length for a payload.
pub const PAYLOAD_LEN: usize = 72;

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const AMOUNT: std::ops::Range<usize> = 0..8;
const MINT: std::ops::Range<usize> = 8..40;
const DESTINATION: std::ops::Range<usize> = 40..72;

/// Fields extracted from a `Program data:` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    /// Raw amount, little-endian u64 from bytes `[0..8)`.
    pub lamports: u64,
    /// Base58 mint address from bytes `[8..40)`.
    pub mint: String,
    /// Base58 destination address from bytes `[40..72)`.
    pub destination: String,
}

impl DecodedPayload {
    /// Amount in whole SOL. Integer division: the fractional part is dropped.
    pub fn amount(&self) -> u64 {
        self.lamports / LAMPORTS_PER_SOL
    }

    /// Returns `true` if the mint address contains `marker`.
    pub fn mint_contains(&self, marker: &str) -> bool {
        !self.mint.is_empty() && self.mint.contains(marker)
    }
}

/// Decode a single log line, returning `None` when the line is not a payload
/// carrier or the payload is malformed.
pub fn decode_log_line(line: &str) -> Option<DecodedPayload> {
    try_decode_log_line(line).ok()
}

/// Like [`decode_log_line`] but reports why a line was rejected.
pub fn try_decode_log_line(line: &str) -> Result<DecodedPayload, DecodeError> {
    let (_, encoded) = line
        .split_once(PROGRAM_DATA_MARKER)
        .ok_or(DecodeError::MissingMarker)?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Base64 { reason: e.to_string() })?;

    decode_payload(&bytes).ok_or(DecodeError::TooShort {
        len: bytes.len(),
        min: PAYLOAD_LEN,
    })
}

/// Parse an already base64-decoded buffer. `None` if shorter than 72 bytes.
pub fn decode_payload(bytes: &[u8]) -> Option<DecodedPayload> {
    if bytes.len() < PAYLOAD_LEN {
        return None;
    }

    let mut amount = [0u8; 8];
    amount.copy_from_slice(&bytes[AMOUNT]);

    Some(DecodedPayload {
        lamports: u64::from_le_bytes(amount),
        mint: bs58::encode(&bytes[MINT]).into_string(),
        destination: bs58::encode(&bytes[DESTINATION]).into_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "2qEHjDLDLbuBgRYvsxhc5D6uDWAivNFZGan56P1tpump";
    const DEST: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn buffer(lamports: u64, mint: &str, dest: &str) -> Vec<u8> {
        let mut buf = lamports.to_le_bytes().to_vec();
        buf.extend(bs58::decode(mint).into_vec().unwrap());
        buf.extend(bs58::decode(dest).into_vec().unwrap());
        buf
    }

    fn line(bytes: &[u8]) -> String {
        format!("Program data: {}", STANDARD.encode(bytes))
    }

    #[test]
    fn decodes_full_payload() {
        let raw = 5_000_000_000u64;
        let p = decode_log_line(&line(&buffer(raw, MINT, DEST))).unwrap();
        assert_eq!(p.lamports, raw);
        assert_eq!(p.amount(), 5);
        assert_eq!(p.mint, MINT);
        assert_eq!(p.destination, DEST);
    }

    #[test]
    fn addresses_round_trip_through_base58() {
        let p = decode_payload(&buffer(1, MINT, DEST)).unwrap();
        assert_eq!(bs58::decode(&p.mint).into_vec().unwrap().len(), 32);
        assert_eq!(bs58::decode(&p.destination).into_vec().unwrap().len(), 32);
        assert_eq!(buffer(1, &p.mint, &p.destination), buffer(1, MINT, DEST));
    }

    #[test]
    fn amount_truncates_fraction() {
        let p = decode_payload(&buffer(2_999_999_999, MINT, DEST)).unwrap();
        assert_eq!(p.amount(), 2);
        let p = decode_payload(&buffer(999_999_999, MINT, DEST)).unwrap();
        assert_eq!(p.amount(), 0);
        let p = decode_payload(&buffer(u64::MAX, MINT, DEST)).unwrap();
        assert_eq!(p.amount(), u64::MAX / LAMPORTS_PER_SOL);
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut buf = buffer(7, MINT, DEST);
        buf.extend_from_slice(&[0xff; 24]);
        let p = decode_log_line(&line(&buf)).unwrap();
        assert_eq!(p.mint, MINT);
    }

    #[test]
    fn surrounding_whitespace_tolerated() {
        let encoded = STANDARD.encode(buffer(1, MINT, DEST));
        let p = decode_log_line(&format!("Program data:   {encoded}  \n")).unwrap();
        assert_eq!(p.destination, DEST);
    }

    #[test]
    fn short_buffers_rejected() {
        for len in [0usize, 1, 8, 40, 71] {
            let buf = vec![1u8; len];
            assert_eq!(decode_log_line(&line(&buf)), None, "len={len}");
        }
        assert_eq!(
            try_decode_log_line(&line(&[0u8; 71])),
            Err(DecodeError::TooShort { len: 71, min: 72 })
        );
    }

    #[test]
    fn invalid_base64_rejected() {
        assert_eq!(decode_log_line("Program data: ***not base64***"), None);
        assert!(matches!(
            try_decode_log_line("Program data: @@"),
            Err(DecodeError::Base64 { .. })
        ));
    }

    #[test]
    fn lines_without_marker_not_applicable() {
        assert_eq!(
            try_decode_log_line("Program log: Instruction: Buy"),
            Err(DecodeError::MissingMarker)
        );
        assert_eq!(decode_log_line(""), None);
    }
}
