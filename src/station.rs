//! Token-ownership state machine for one ring node.
//!
//! A [`Station`] tracks whether this node holds the token, arbitrates the
//! turn-based transmission gate, and recovers from token loss. It consumes
//! decoded frames and ticks, and produces upward [`LinkEvent`]s plus
//! outgoing [`Frame`]s; it performs no I/O and never blocks.
//!
//! # Turn lifecycle
//!
//! Receiving a token frame starts a turn: queued payloads drain immediately
//! (bounded by the per-turn quota) and the application may keep sending
//! while the turn lasts. The turn ends on the first `tick` after the hold
//! time elapses or the quota is exhausted, at which point exactly one token
//! frame is emitted outward and the node goes idle.
//!
//! # Loss recovery
//!
//! While idle, a silence timer accumulates across ticks and is reset by any
//! decoded frame. When it expires the node regenerates: it takes the token
//! as if one had been received and runs a normal turn, so the regenerated
//! token reaches the wire through the usual single emission at turn end.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::protocol::Frame;

/// Token possession state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    /// Not holding the token; transmission requests fail fast.
    Idle,
    /// Holding the token; this node's turn to transmit.
    Holding,
}

/// Notification surfaced to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// This node now holds the token and may transmit.
    TokenAcquired,
    /// This node passed the token onward.
    TokenReleased,
    /// A data frame with a verified checksum arrived.
    DataReceived(Bytes),
    /// The silence timer expired and this node regenerated a token.
    TokenRegenerated,
}

/// Per-node token state machine.
#[derive(Debug)]
pub struct Station {
    state: StationState,
    /// Time since the last decoded frame, advanced while idle.
    silent_for: Duration,
    /// Time spent in the current turn, advanced while holding.
    held_for: Duration,
    /// Data frames still permitted this turn.
    quota_remaining: usize,
    /// Payloads accepted but not yet turned into outgoing frames.
    tx_queue: VecDeque<Bytes>,
    events: VecDeque<LinkEvent>,
    outgoing: VecDeque<Frame>,
    regeneration_timeout: Duration,
    turn_hold: Duration,
    per_turn_quota: usize,
    send_queue_depth: usize,
    regenerations: u64,
    duplicate_tokens: u64,
    frames_sent: u64,
    tokens_passed: u64,
}

impl Station {
    /// Create a station from a validated configuration.
    ///
    /// With `bootstrap_holder` set, the node starts its first turn
    /// immediately; exactly one node per ring does this.
    pub fn new(config: &LinkConfig) -> Self {
        let mut station = Self {
            state: StationState::Idle,
            silent_for: Duration::ZERO,
            held_for: Duration::ZERO,
            quota_remaining: 0,
            tx_queue: VecDeque::new(),
            events: VecDeque::new(),
            outgoing: VecDeque::new(),
            regeneration_timeout: config.regeneration_timeout(),
            turn_hold: config.turn_hold(),
            per_turn_quota: config.per_turn_quota,
            send_queue_depth: config.send_queue_depth,
            regenerations: 0,
            duplicate_tokens: 0,
            frames_sent: 0,
            tokens_passed: 0,
        };
        if config.bootstrap_holder {
            station.acquire_token(false);
        }
        station
    }

    /// Feed one decoded frame, in arrival order.
    ///
    /// Any frame counts as ring traffic and resets the silence timer.
    pub fn on_frame(&mut self, frame: Frame) {
        self.silent_for = Duration::ZERO;
        match frame {
            Frame::Token => self.acquire_token(false),
            Frame::Data(payload) => self.events.push_back(LinkEvent::DataReceived(payload)),
        }
    }

    /// Queue application data for transmission during this node's turn.
    ///
    /// Fails fast with [`LinkError::NotHolder`] outside a turn (the caller
    /// retries next turn, it is never buffered behind its back) and with
    /// [`LinkError::QueueFull`] when the bounded queue is full. Queued
    /// payloads transmit immediately while quota remains; any excess stays
    /// queued for this node's next turn.
    pub fn request_send(&mut self, payload: Bytes) -> Result<()> {
        if self.state != StationState::Holding {
            return Err(LinkError::NotHolder);
        }
        if self.tx_queue.len() >= self.send_queue_depth {
            return Err(LinkError::QueueFull {
                depth: self.send_queue_depth,
            });
        }
        self.tx_queue.push_back(payload);
        self.flush_queue();
        Ok(())
    }

    /// Advance the timers by `elapsed`. Must be called at a bounded, known
    /// cadence; this is the resolution of turn end and loss recovery.
    pub fn tick(&mut self, elapsed: Duration) {
        match self.state {
            StationState::Holding => {
                self.held_for += elapsed;
                self.flush_queue();
                if self.held_for >= self.turn_hold || self.quota_remaining == 0 {
                    self.release_token();
                }
            }
            StationState::Idle => {
                self.silent_for += elapsed;
                if self.silent_for >= self.regeneration_timeout {
                    self.silent_for = Duration::ZERO;
                    self.regenerations += 1;
                    self.acquire_token(true);
                }
            }
        }
    }

    /// Next pending upward event, oldest first.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }

    /// Next frame to transmit, in emission order.
    pub fn poll_outgoing(&mut self) -> Option<Frame> {
        self.outgoing.pop_front()
    }

    /// Current possession state.
    pub fn state(&self) -> StationState {
        self.state
    }

    /// True while this node holds the token.
    pub fn holds_token(&self) -> bool {
        self.state == StationState::Holding
    }

    /// Payloads queued but not yet framed.
    pub fn queued_len(&self) -> usize {
        self.tx_queue.len()
    }

    /// Tokens regenerated after silence (the loss counter).
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Token frames observed while already holding.
    pub fn duplicate_tokens(&self) -> u64 {
        self.duplicate_tokens
    }

    /// Data frames emitted for transmission.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Token frames emitted at turn end.
    pub fn tokens_passed(&self) -> u64 {
        self.tokens_passed
    }

    fn acquire_token(&mut self, regenerated: bool) {
        if self.state == StationState::Holding {
            // A second token on the ring; observe it, never double-hold.
            self.duplicate_tokens += 1;
            return;
        }
        self.state = StationState::Holding;
        self.held_for = Duration::ZERO;
        self.quota_remaining = self.per_turn_quota;
        if regenerated {
            self.events.push_back(LinkEvent::TokenRegenerated);
        }
        self.events.push_back(LinkEvent::TokenAcquired);
        self.flush_queue();
    }

    fn release_token(&mut self) {
        // Exactly one token frame per turn relinquishment.
        self.outgoing.push_back(Frame::Token);
        self.tokens_passed += 1;
        self.state = StationState::Idle;
        self.silent_for = Duration::ZERO;
        self.events.push_back(LinkEvent::TokenReleased);
    }

    fn flush_queue(&mut self) {
        while self.quota_remaining > 0 {
            let Some(payload) = self.tx_queue.pop_front() else {
                break;
            };
            self.outgoing.push_back(Frame::Data(payload));
            self.quota_remaining -= 1;
            self.frames_sent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinkConfig {
        LinkConfig {
            regeneration_timeout_ms: 100,
            turn_hold_ms: 20,
            per_turn_quota: 2,
            send_queue_depth: 4,
            tick_interval_ms: 5,
            ..LinkConfig::default()
        }
    }

    fn drain_events(station: &mut Station) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = station.poll_event() {
            events.push(event);
        }
        events
    }

    fn drain_outgoing(station: &mut Station) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = station.poll_outgoing() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_starts_idle_without_bootstrap() {
        let mut station = Station::new(&config());

        assert_eq!(station.state(), StationState::Idle);
        assert!(drain_events(&mut station).is_empty());
    }

    #[test]
    fn test_bootstrap_holder_starts_with_token() {
        let mut station = Station::new(&LinkConfig {
            bootstrap_holder: true,
            ..config()
        });

        assert!(station.holds_token());
        assert_eq!(drain_events(&mut station), vec![LinkEvent::TokenAcquired]);
    }

    #[test]
    fn test_token_frame_acquires() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Token);

        assert!(station.holds_token());
        assert_eq!(drain_events(&mut station), vec![LinkEvent::TokenAcquired]);
    }

    #[test]
    fn test_duplicate_token_is_counted_not_restarted() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Token);
        station.request_send(Bytes::from_static(b"x")).unwrap();
        station.on_frame(Frame::Token);

        assert_eq!(station.duplicate_tokens(), 1);
        // The in-progress turn kept its quota accounting.
        assert_eq!(drain_outgoing(&mut station).len(), 1);
    }

    #[test]
    fn test_data_frame_surfaces_event_only() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Data(Bytes::from_static(b"hello")));

        assert_eq!(station.state(), StationState::Idle);
        assert_eq!(
            drain_events(&mut station),
            vec![LinkEvent::DataReceived(Bytes::from_static(b"hello"))]
        );
    }

    #[test]
    fn test_request_send_fails_while_idle() {
        let mut station = Station::new(&config());
        let result = station.request_send(Bytes::from_static(b"nope"));

        assert!(matches!(result, Err(LinkError::NotHolder)));
        assert!(drain_outgoing(&mut station).is_empty());
    }

    #[test]
    fn test_request_send_transmits_within_quota() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Token);

        station.request_send(Bytes::from_static(b"a")).unwrap();
        station.request_send(Bytes::from_static(b"b")).unwrap();
        // Quota is 2; the third stays queued for the next turn.
        station.request_send(Bytes::from_static(b"c")).unwrap();

        let frames = drain_outgoing(&mut station);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload(), Some(&b"a"[..]));
        assert_eq!(frames[1].payload(), Some(&b"b"[..]));
        assert_eq!(station.queued_len(), 1);
        assert_eq!(station.frames_sent(), 2);
    }

    #[test]
    fn test_leftover_queue_drains_next_turn() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Token);
        for payload in [&b"1"[..], &b"2"[..], &b"3"[..]] {
            station.request_send(Bytes::copy_from_slice(payload)).unwrap();
        }
        drain_outgoing(&mut station);

        // Quota exhausted: the next tick ends the turn.
        station.tick(Duration::from_millis(5));
        assert!(!station.holds_token());
        assert_eq!(drain_outgoing(&mut station), vec![Frame::Token]);

        station.on_frame(Frame::Token);
        let frames = drain_outgoing(&mut station);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), Some(&b"3"[..]));
    }

    #[test]
    fn test_queue_full() {
        let mut station = Station::new(&LinkConfig {
            per_turn_quota: 1,
            send_queue_depth: 2,
            ..config()
        });
        station.on_frame(Frame::Token);

        station.request_send(Bytes::from_static(b"sent")).unwrap(); // transmitted
        station.request_send(Bytes::from_static(b"q1")).unwrap();
        station.request_send(Bytes::from_static(b"q2")).unwrap();
        let result = station.request_send(Bytes::from_static(b"q3"));

        assert!(matches!(result, Err(LinkError::QueueFull { depth: 2 })));
    }

    #[test]
    fn test_turn_ends_after_hold_time() {
        let mut station = Station::new(&config());
        station.on_frame(Frame::Token);

        station.tick(Duration::from_millis(5));
        assert!(station.holds_token());

        station.tick(Duration::from_millis(15));
        assert!(!station.holds_token());

        let mut events = drain_events(&mut station);
        assert_eq!(events.pop(), Some(LinkEvent::TokenReleased));
        assert_eq!(drain_outgoing(&mut station), vec![Frame::Token]);
        assert_eq!(station.tokens_passed(), 1);
    }

    #[test]
    fn test_regeneration_after_silence() {
        let mut station = Station::new(&config());

        for _ in 0..19 {
            station.tick(Duration::from_millis(5));
        }
        assert_eq!(station.regenerations(), 0);

        station.tick(Duration::from_millis(5)); // crosses 100ms
        assert_eq!(station.regenerations(), 1);
        assert!(station.holds_token());
        assert_eq!(
            drain_events(&mut station),
            vec![LinkEvent::TokenRegenerated, LinkEvent::TokenAcquired]
        );

        // The regenerated token reaches the wire once, at turn end.
        station.tick(Duration::from_millis(20));
        assert_eq!(drain_outgoing(&mut station), vec![Frame::Token]);
    }

    #[test]
    fn test_traffic_resets_silence_timer() {
        let mut station = Station::new(&config());

        station.tick(Duration::from_millis(95));
        station.on_frame(Frame::Data(Bytes::from_static(b"keepalive")));
        station.tick(Duration::from_millis(95));

        assert_eq!(station.regenerations(), 0);

        station.tick(Duration::from_millis(5));
        assert_eq!(station.regenerations(), 1);
    }

    #[test]
    fn test_silence_timer_does_not_run_while_holding() {
        let mut station = Station::new(&LinkConfig {
            turn_hold_ms: 1_000,
            ..config()
        });
        station.on_frame(Frame::Token);

        station.tick(Duration::from_millis(500));
        assert!(station.holds_token());
        assert_eq!(station.regenerations(), 0);
    }
}
