//! Frame type and wire serialization.
//!
//! A [`Frame`] is the unit of exchange on the ring. Uses `bytes::Bytes` for
//! zero-copy payload sharing between the decoder, the station, and the
//! application.
//!
//! # Example
//!
//! ```
//! use ringlink::protocol::{ChecksumKind, Frame};
//!
//! let frame = Frame::data(&b"ABC"[..]).unwrap();
//! let wire = frame.encode(ChecksumKind::Sum);
//! assert_eq!(&wire[..], &[0xBB, 0x03, 0x41, 0x42, 0x43, 0xC6]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire::{check_payload_len, ChecksumKind, DATA_FRAME_OVERHEAD, DATA_SENTINEL, TOKEN_SENTINEL};
use crate::error::Result;

/// The unit of exchange on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Transfer of transmission rights; no payload.
    Token,
    /// Application payload, integrity-checked on decode.
    Data(Bytes),
}

impl Frame {
    /// Create a data frame, validating the payload against the wire limit.
    pub fn data(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        Ok(Self::Data(payload))
    }

    /// True for token frames.
    #[inline]
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token)
    }

    /// Payload bytes of a data frame, `None` for tokens.
    #[inline]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Token => None,
            Self::Data(payload) => Some(payload),
        }
    }

    /// Total wire length of this frame once encoded.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Token => 1,
            Self::Data(payload) => payload.len() + DATA_FRAME_OVERHEAD,
        }
    }

    /// Serialize to wire form.
    ///
    /// Token frames are the bare sentinel. Data frames are sentinel, length
    /// byte, payload, then the checksum computed over the payload bytes only.
    pub fn encode(&self, checksum: ChecksumKind) -> Bytes {
        match self {
            Self::Token => Bytes::from_static(&[TOKEN_SENTINEL]),
            Self::Data(payload) => {
                let mut buf = BytesMut::with_capacity(self.encoded_len());
                buf.put_u8(DATA_SENTINEL);
                buf.put_u8(payload.len() as u8);
                buf.put_slice(payload);
                buf.put_u8(checksum.compute(payload));
                buf.freeze()
            }
        }
    }
}
