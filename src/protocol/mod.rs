//! Protocol module - wire format, framing, and integrity.
//!
//! This module owns no token semantics; it converts between byte streams
//! and frames:
//! - sentinel-based wire format and checksum algorithms
//! - [`Frame`] with encoding helpers
//! - [`FrameDecoder`] for accumulating chunked input into whole frames

mod decoder;
mod frame;
mod wire;

pub use decoder::{FrameDecoder, DEFAULT_RECV_CAPACITY};
pub use frame::Frame;
pub use wire::{
    check_payload_len, ChecksumKind, DATA_FRAME_OVERHEAD, DATA_SENTINEL, MAX_FRAME_LEN,
    MAX_PAYLOAD_LEN, TOKEN_SENTINEL,
};
