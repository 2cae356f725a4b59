//! Frame decoder: bounded byte accumulation and the parser state machine.
//!
//! Reconstructs frames from an append-only, arbitrarily chunked byte stream.
//! Implements a cursor over three states:
//! - `Idle`: scanning for a sentinel; non-sentinel bytes are inter-frame
//!   noise and are consumed silently
//! - `AwaitingLength`: a data sentinel was seen, the next byte is the
//!   payload length
//! - `AwaitingPayload`: accumulating `length + 1` bytes (payload plus
//!   checksum) into an accumulator that owns the in-progress frame's bytes
//!
//! The pending buffer is bounded: [`FrameDecoder::feed`] rejects input that
//! would exceed capacity instead of silently truncating, so the caller can
//! apply its own backpressure or drop policy.
//!
//! # Example
//!
//! ```
//! use ringlink::protocol::{ChecksumKind, Frame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
//! decoder.feed(&[0xAA, 0xBB, 0x02, 0x41, 0x42, 0x83]).unwrap();
//!
//! assert_eq!(decoder.poll_frame(), Some(Frame::Token));
//! assert!(matches!(decoder.poll_frame(), Some(Frame::Data(_))));
//! assert_eq!(decoder.poll_frame(), None);
//! ```

use bytes::BytesMut;

use super::frame::Frame;
use super::wire::{ChecksumKind, DATA_SENTINEL, MAX_PAYLOAD_LEN, TOKEN_SENTINEL};
use crate::error::{LinkError, Result};

/// Default capacity of the pending-bytes buffer.
///
/// Holds one maximum-size frame; sized for an embedded receive path that
/// drains the decoder on every chunk.
pub const DEFAULT_RECV_CAPACITY: usize = 256;

/// Parser cursor: progress through an in-flight frame.
///
/// The in-progress frame's bytes live in the `AwaitingPayload` accumulator,
/// not at offsets into the shared pending buffer, so completion never
/// re-derives a frame start backwards from the read position.
#[derive(Debug)]
enum Cursor {
    /// Scanning for a sentinel.
    Idle,
    /// Data sentinel consumed; next byte is the payload length.
    AwaitingLength,
    /// Accumulating payload plus the trailing checksum byte.
    AwaitingPayload {
        expected: usize,
        accumulated: BytesMut,
    },
}

/// Decoder for the incoming byte stream of one link.
///
/// Owns the bounded pending buffer and the parser cursor. Feeding and
/// polling are separate so that a single `feed` may yield zero, one, or
/// many frames; `poll_frame` is called repeatedly until `None` to drain.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Not-yet-parsed input bytes, bounded by `capacity`.
    buffer: BytesMut,
    /// Fixed capacity of the pending buffer.
    capacity: usize,
    /// Parser cursor.
    cursor: Cursor,
    /// Ring-wide checksum algorithm.
    checksum: ChecksumKind,
    frames_decoded: u64,
    checksum_mismatches: u64,
    invalid_lengths: u64,
    overflows: u64,
}

impl FrameDecoder {
    /// Create a decoder with the default pending-buffer capacity.
    pub fn new(checksum: ChecksumKind) -> Self {
        Self::with_capacity(DEFAULT_RECV_CAPACITY, checksum)
    }

    /// Create a decoder with a custom pending-buffer capacity.
    pub fn with_capacity(capacity: usize, checksum: ChecksumKind) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            cursor: Cursor::Idle,
            checksum,
            frames_decoded: 0,
            checksum_mismatches: 0,
            invalid_lengths: 0,
            overflows: 0,
        }
    }

    /// Append received bytes to the pending buffer.
    ///
    /// Overflow policy is drop-new: if the chunk does not fit, the buffer
    /// (and any in-flight frame boundary in it) is preserved untouched and
    /// the whole chunk is rejected with [`LinkError::Overflow`]. Distinct
    /// from "no data yet", which is `poll_frame()` returning `None`.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if self.buffer.len() + data.len() > self.capacity {
            self.overflows += 1;
            return Err(LinkError::Overflow {
                capacity: self.capacity,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Advance the cursor and return the next complete, integrity-checked
    /// frame, or `None` if more bytes are needed.
    ///
    /// Frames failing the checksum are discarded and counted; the cursor
    /// resets at the byte after the bad frame, and the discarded payload
    /// bytes are never re-scanned for sentinels.
    pub fn poll_frame(&mut self) -> Option<Frame> {
        loop {
            match &mut self.cursor {
                Cursor::Idle => loop {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let byte = self.buffer.split_to(1)[0];
                    match byte {
                        TOKEN_SENTINEL => {
                            self.frames_decoded += 1;
                            return Some(Frame::Token);
                        }
                        DATA_SENTINEL => {
                            self.cursor = Cursor::AwaitingLength;
                            break;
                        }
                        // Inter-frame noise: consumed, not an error.
                        _ => {}
                    }
                },

                Cursor::AwaitingLength => {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let len = self.buffer.split_to(1)[0] as usize;
                    if len > MAX_PAYLOAD_LEN {
                        // No valid frame can claim this length; resync.
                        self.invalid_lengths += 1;
                        self.cursor = Cursor::Idle;
                        continue;
                    }
                    self.cursor = Cursor::AwaitingPayload {
                        expected: len,
                        accumulated: BytesMut::with_capacity(len + 1),
                    };
                }

                Cursor::AwaitingPayload {
                    expected,
                    accumulated,
                } => {
                    let needed = *expected + 1 - accumulated.len();
                    let take = needed.min(self.buffer.len());
                    if take > 0 {
                        let chunk = self.buffer.split_to(take);
                        accumulated.extend_from_slice(&chunk);
                    }
                    if accumulated.len() < *expected + 1 {
                        return None;
                    }

                    let expected = *expected;
                    let mut body = std::mem::take(accumulated);
                    self.cursor = Cursor::Idle;

                    let payload = body.split_to(expected).freeze();
                    let received = body[0];
                    if received == self.checksum.compute(&payload) {
                        self.frames_decoded += 1;
                        return Some(Frame::Data(payload));
                    }
                    self.checksum_mismatches += 1;
                }
            }
        }
    }

    /// Bytes currently pending in the buffer (excluding any accumulated
    /// in-flight frame body).
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard pending bytes and reset the cursor. Counters are kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = Cursor::Idle;
    }

    /// Frames decoded and handed upward.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Frames discarded for a bad checksum.
    pub fn checksum_mismatches(&self) -> u64 {
        self.checksum_mismatches
    }

    /// Data frames discarded for an impossible length byte.
    pub fn invalid_lengths(&self) -> u64 {
        self.invalid_lengths
    }

    /// Chunks rejected because the pending buffer was full.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Helper to build a valid data frame as wire bytes.
    fn data_frame_bytes(payload: &[u8], checksum: ChecksumKind) -> Vec<u8> {
        let mut bytes = vec![DATA_SENTINEL, payload.len() as u8];
        bytes.extend_from_slice(payload);
        bytes.push(checksum.compute(payload));
        bytes
    }

    fn drain(decoder: &mut FrameDecoder) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.poll_frame() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_token_frame() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        decoder.feed(&[TOKEN_SENTINEL]).unwrap();

        assert_eq!(decoder.poll_frame(), Some(Frame::Token));
        assert_eq!(decoder.poll_frame(), None);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_data_frame() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        decoder
            .feed(&data_frame_bytes(b"ABC", ChecksumKind::Sum))
            .unwrap();

        let frame = decoder.poll_frame().unwrap();
        assert_eq!(frame.payload(), Some(&b"ABC"[..]));
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Crc8);
        decoder.feed(&[DATA_SENTINEL, 0x00, 0x00]).unwrap();

        let frame = decoder.poll_frame().unwrap();
        assert_eq!(frame.payload(), Some(&[][..]));
    }

    #[test]
    fn test_multiple_frames_in_one_feed() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        let mut stream = vec![TOKEN_SENTINEL];
        stream.extend(data_frame_bytes(b"one", ChecksumKind::Sum));
        stream.extend(data_frame_bytes(b"two", ChecksumKind::Sum));
        stream.push(TOKEN_SENTINEL);
        decoder.feed(&stream).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames.len(), 4);
        assert!(frames[0].is_token());
        assert_eq!(frames[1].payload(), Some(&b"one"[..]));
        assert_eq!(frames[2].payload(), Some(&b"two"[..]));
        assert!(frames[3].is_token());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        let stream = data_frame_bytes(b"chunked", ChecksumKind::Sum);

        let mut frames = Vec::new();
        for byte in &stream {
            decoder.feed(&[*byte]).unwrap();
            frames.extend(drain(&mut decoder));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), Some(&b"chunked"[..]));
    }

    #[test]
    fn test_inter_frame_noise_is_consumed() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        let mut stream = vec![0x00, 0x13, 0x37];
        stream.push(TOKEN_SENTINEL);
        stream.extend([0x42, 0x42]);
        stream.extend(data_frame_bytes(b"ok", ChecksumKind::Sum));
        decoder.feed(&stream).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_token());
        assert_eq!(frames[1].payload(), Some(&b"ok"[..]));
    }

    #[test]
    fn test_checksum_mismatch_drops_exactly_one_frame() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);

        // Corrupt the checksum byte of the first frame only.
        let mut bad = data_frame_bytes(b"AB", ChecksumKind::Sum);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        bad.extend(data_frame_bytes(b"good", ChecksumKind::Sum));
        decoder.feed(&bad).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), Some(&b"good"[..]));
        assert_eq!(decoder.checksum_mismatches(), 1);
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn test_discarded_payload_is_not_rescanned_for_sentinels() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);

        // Payload contains both sentinel values; with a corrupt checksum the
        // whole frame must vanish without resynchronizing inside it.
        let payload = [TOKEN_SENTINEL, DATA_SENTINEL, 0x01];
        let mut bad = data_frame_bytes(&payload, ChecksumKind::Sum);
        let last = bad.len() - 1;
        bad[last] ^= 0x55;
        bad.push(TOKEN_SENTINEL);
        decoder.feed(&bad).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames, vec![Frame::Token]);
        assert_eq!(decoder.checksum_mismatches(), 1);
    }

    #[test]
    fn test_invalid_length_resynchronizes() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        let mut stream = vec![DATA_SENTINEL, 0xFF];
        stream.push(TOKEN_SENTINEL);
        decoder.feed(&stream).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames, vec![Frame::Token]);
        assert_eq!(decoder.invalid_lengths(), 1);
    }

    #[test]
    fn test_overflow_rejects_chunk_and_preserves_buffer() {
        let mut decoder = FrameDecoder::with_capacity(8, ChecksumKind::Sum);

        decoder.feed(&[DATA_SENTINEL, 0x06, 0x01, 0x02]).unwrap();
        let result = decoder.feed(&[0u8; 8]);
        assert!(matches!(result, Err(LinkError::Overflow { capacity: 8 })));
        assert_eq!(decoder.overflows(), 1);

        // The in-flight frame survives and completes once room frees up.
        let payload = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let _ = decoder.poll_frame(); // drains pending bytes into the accumulator
        decoder
            .feed(&[0x03, 0x04, 0x05, 0x06, ChecksumKind::Sum.compute(&payload)])
            .unwrap();
        let frame = decoder.poll_frame().unwrap();
        assert_eq!(frame.payload(), Some(&payload[..]));
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        decoder.feed(&[DATA_SENTINEL, 0x05, 0x01]).unwrap();
        assert_eq!(decoder.poll_frame(), None);

        decoder.clear();
        decoder.feed(&[TOKEN_SENTINEL]).unwrap();
        assert_eq!(decoder.poll_frame(), Some(Frame::Token));
    }

    #[test]
    fn test_literal_data_frame_bytes() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        decoder
            .feed(&[0xBB, 0x03, 0x41, 0x42, 0x43, 0xC6])
            .unwrap();

        let frame = decoder.poll_frame().unwrap();
        assert_eq!(frame.payload(), Some(&[0x41, 0x42, 0x43][..]));
    }

    #[test]
    fn test_literal_bad_checksum_bytes() {
        let mut decoder = FrameDecoder::new(ChecksumKind::Sum);
        decoder.feed(&[0xBB, 0x02, 0x41, 0x42, 0xFF]).unwrap();

        assert_eq!(decoder.poll_frame(), None);
        assert_eq!(decoder.checksum_mismatches(), 1);

        decoder
            .feed(&data_frame_bytes(b"next", ChecksumKind::Sum))
            .unwrap();
        assert_eq!(
            decoder.poll_frame().unwrap().payload(),
            Some(&b"next"[..])
        );
    }

    /// One logical frame for the property tests: `None` is a token.
    fn frame_strategy() -> impl Strategy<Value = Option<Vec<u8>>> {
        prop::option::of(prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN))
    }

    fn encode_stream(frames: &[Option<Vec<u8>>], checksum: ChecksumKind) -> Vec<u8> {
        let mut stream = Vec::new();
        for frame in frames {
            match frame {
                None => stream.push(TOKEN_SENTINEL),
                Some(payload) => stream.extend(data_frame_bytes(payload, checksum)),
            }
        }
        stream
    }

    proptest! {
        /// encode → decode round-trips for every payload length 0–253.
        #[test]
        fn prop_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN)) {
            let checksum = ChecksumKind::Crc8;
            let wire = Frame::data(payload.clone()).unwrap().encode(checksum);

            let mut decoder = FrameDecoder::new(checksum);
            decoder.feed(&wire).unwrap();

            let frame = decoder.poll_frame().unwrap();
            prop_assert_eq!(frame.payload(), Some(&payload[..]));
            prop_assert_eq!(frame.encode(checksum), wire);
            prop_assert_eq!(decoder.poll_frame(), None);
        }

        /// Decoding is independent of how the stream is chunked.
        #[test]
        fn prop_chunk_size_independence(
            frames in prop::collection::vec(frame_strategy(), 1..6),
            chunk_sizes in prop::collection::vec(1usize..16, 1..32),
        ) {
            let checksum = ChecksumKind::Sum;
            let stream = encode_stream(&frames, checksum);

            // Reference: the whole stream at once (large enough buffer).
            let mut whole = FrameDecoder::with_capacity(stream.len().max(1), checksum);
            whole.feed(&stream).unwrap();
            let expected = drain(&mut whole);

            // Chunked: walk the stream with the generated chunk sizes,
            // draining after every feed so the bounded buffer never fills.
            let mut chunked = FrameDecoder::new(checksum);
            let mut got = Vec::new();
            let mut offset = 0;
            let mut next = 0;
            while offset < stream.len() {
                let size = chunk_sizes[next % chunk_sizes.len()].min(stream.len() - offset);
                next += 1;
                chunked.feed(&stream[offset..offset + size]).unwrap();
                offset += size;
                got.extend(drain(&mut chunked));
            }

            prop_assert_eq!(got, expected);
        }
    }
}
