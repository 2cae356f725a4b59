//! Wire format constants and integrity checks.
//!
//! The ring speaks a two-frame wire format:
//! ```text
//! Token frame:  ┌──────┐
//!               │ 0xAA │                                  (1 byte total)
//!               └──────┘
//! Data frame:   ┌──────┬────────┬─────────────┬──────────┐
//!               │ 0xBB │ Length │ Payload     │ Checksum │
//!               │ 1 B  │ 1 B    │ 0–253 bytes │ 1 B      │
//!               └──────┴────────┴─────────────┴──────────┘
//! ```
//!
//! All quantities are single bytes; the one length field caps the payload so
//! that no frame ever exceeds 256 bytes on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Sentinel byte that is, by itself, an entire token frame.
pub const TOKEN_SENTINEL: u8 = 0xAA;

/// Sentinel byte that starts a data frame.
pub const DATA_SENTINEL: u8 = 0xBB;

/// Maximum payload length per data frame.
pub const MAX_PAYLOAD_LEN: usize = 253;

/// Bytes of data-frame overhead: sentinel, length, checksum.
pub const DATA_FRAME_OVERHEAD: usize = 3;

/// Maximum total wire length of any frame.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + DATA_FRAME_OVERHEAD;

/// Checksum algorithm shared by every node on the ring.
///
/// The algorithm is a configuration point, not a constant: all nodes must
/// agree on it, and a ring is free to pick either. Both produce a single
/// byte, and both define the checksum of the empty sequence as `0x00`
/// (zero-length payloads still carry a checksum byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    /// Wrapping byte sum modulo 256.
    #[default]
    Sum,
    /// CRC-8/ATM: polynomial 0x07, init 0x00, no reflection.
    Crc8,
}

impl ChecksumKind {
    /// Compute the one-byte checksum over a payload.
    pub fn compute(self, payload: &[u8]) -> u8 {
        match self {
            Self::Sum => payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)),
            Self::Crc8 => crc8_atm(payload),
        }
    }
}

/// Bitwise CRC-8/ATM. The checksum field is a single byte, so the usual
/// 32-bit CRC crates do not apply; eight shifts per byte is cheap enough
/// for 253-byte frames on an embedded target.
fn crc8_atm(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Validate a payload length against the per-frame wire limit.
pub fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_LEN {
        return Err(LinkError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}
