//! Link engine: the composition root for one ring node.
//!
//! A [`LinkEngine`] owns one [`FrameDecoder`] and one [`Station`] and wires
//! them together: received bytes are decoded and fed to the station in
//! arrival order, and the station's outgoing frames are serialized back to
//! wire bytes on demand. Engines are plain owned values, so a whole ring can
//! be simulated in one test by instantiating several and shuttling bytes
//! between them.
//!
//! The engine performs no I/O, never blocks, and is driven from exactly
//! three call sites that the embedding must serialize (one task or one
//! lock): [`feed`](LinkEngine::feed) from the transport's receive path,
//! [`tick`](LinkEngine::tick) from a periodic timer, and
//! [`send`](LinkEngine::send) from the application.
//!
//! # Example
//!
//! ```
//! use ringlink::config::LinkConfig;
//! use ringlink::engine::LinkEngine;
//! use ringlink::station::LinkEvent;
//!
//! let mut engine = LinkEngine::new(&LinkConfig::default()).unwrap();
//! engine.feed(&[0xAA]).unwrap(); // a token frame arrives
//!
//! assert_eq!(engine.poll_event(), Some(LinkEvent::TokenAcquired));
//! assert!(engine.holds_token());
//! ```

use std::time::Duration;

use bytes::Bytes;

use crate::config::LinkConfig;
use crate::error::Result;
use crate::protocol::{check_payload_len, ChecksumKind, FrameDecoder};
use crate::station::{LinkEvent, Station, StationState};

/// Snapshot of the engine's observability counters.
///
/// All conditions in the error taxonomy that resolve locally (overflow,
/// checksum mismatch, token loss) are visible here rather than halting
/// anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames decoded and handed to the station.
    pub frames_decoded: u64,
    /// Frames discarded for a bad checksum.
    pub checksum_mismatches: u64,
    /// Data frames discarded for an impossible length byte.
    pub invalid_lengths: u64,
    /// Received chunks rejected because the pending buffer was full.
    pub overflows: u64,
    /// Tokens regenerated after silence (the loss counter).
    pub regenerations: u64,
    /// Token frames observed while already holding.
    pub duplicate_tokens: u64,
    /// Data frames emitted for transmission.
    pub frames_sent: u64,
    /// Token frames emitted at turn end.
    pub tokens_passed: u64,
}

/// Protocol engine for one node: framing, integrity, token arbitration.
#[derive(Debug)]
pub struct LinkEngine {
    decoder: FrameDecoder,
    station: Station,
    checksum: ChecksumKind,
}

impl LinkEngine {
    /// Build an engine from a configuration, validating it first.
    pub fn new(config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            decoder: FrameDecoder::with_capacity(config.recv_buffer_capacity, config.checksum),
            station: Station::new(config),
            checksum: config.checksum,
        })
    }

    /// Feed raw received bytes and run every completed frame through the
    /// token state machine.
    ///
    /// On overflow the chunk is rejected whole and already-buffered bytes
    /// are untouched; the caller decides between backpressure and dropping.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.decoder.feed(data)?;
        while let Some(frame) = self.decoder.poll_frame() {
            self.station.on_frame(frame);
        }
        Ok(())
    }

    /// Queue application data for transmission during this node's turn.
    ///
    /// Fails fast with [`LinkError::PayloadTooLarge`](crate::error::LinkError::PayloadTooLarge)
    /// over the wire limit and [`LinkError::NotHolder`](crate::error::LinkError::NotHolder)
    /// outside a turn.
    pub fn send(&mut self, payload: Bytes) -> Result<()> {
        check_payload_len(payload.len())?;
        self.station.request_send(payload)
    }

    /// Advance the turn and regeneration timers.
    pub fn tick(&mut self, elapsed: Duration) {
        self.station.tick(elapsed);
    }

    /// Next pending upward event, oldest first.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.station.poll_event()
    }

    /// Next outgoing frame, already serialized to wire bytes.
    pub fn poll_outgoing(&mut self) -> Option<Bytes> {
        self.station
            .poll_outgoing()
            .map(|frame| frame.encode(self.checksum))
    }

    /// Current possession state.
    pub fn state(&self) -> StationState {
        self.station.state()
    }

    /// True while this node holds the token.
    pub fn holds_token(&self) -> bool {
        self.station.holds_token()
    }

    /// Snapshot every counter.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            frames_decoded: self.decoder.frames_decoded(),
            checksum_mismatches: self.decoder.checksum_mismatches(),
            invalid_lengths: self.decoder.invalid_lengths(),
            overflows: self.decoder.overflows(),
            regenerations: self.station.regenerations(),
            duplicate_tokens: self.station.duplicate_tokens(),
            frames_sent: self.station.frames_sent(),
            tokens_passed: self.station.tokens_passed(),
        }
    }
}
