//! Engine configuration.
//!
//! Every protocol tunable the ring must agree on (or a node may tune
//! locally) lives here: the regeneration timeout, per-turn transmission
//! quota, turn hold time, checksum algorithm, buffer bounds, and tick
//! cadence. None of these are compile-time constants.
//!
//! Configs deserialize from JSON with every field optional:
//!
//! ```
//! use ringlink::config::LinkConfig;
//!
//! let config = LinkConfig::from_json_str(
//!     r#"{ "regeneration_timeout_ms": 250, "checksum": "crc8" }"#,
//! ).unwrap();
//! assert_eq!(config.regeneration_timeout_ms, 250);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::protocol::{ChecksumKind, MAX_FRAME_LEN};

/// Configuration for one link engine / ring node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Silence (no decoded frames) tolerated while not holding the token
    /// before this node regenerates one. Nodes on a ring should use
    /// distinct values so at most one regenerates first.
    pub regeneration_timeout_ms: u64,

    /// How long a node keeps the token before passing it on, independent
    /// of whether it has data queued. Zero means "release on the next
    /// tick after acquisition".
    pub turn_hold_ms: u64,

    /// Maximum data frames transmitted per turn. Bounds each turn so no
    /// node can starve the ring.
    pub per_turn_quota: usize,

    /// Capacity of the decoder's pending-bytes buffer. Must hold at least
    /// one maximum-size frame.
    pub recv_buffer_capacity: usize,

    /// Depth of the bounded queue of payloads awaiting transmission.
    pub send_queue_depth: usize,

    /// Checksum algorithm; must match every other node on the ring.
    pub checksum: ChecksumKind,

    /// Whether this node starts out holding the token. Exactly one node
    /// per ring bootstraps the first token this way.
    pub bootstrap_holder: bool,

    /// Cadence at which the runtime drives [`tick`](crate::engine::LinkEngine::tick);
    /// this is the resolution of the regeneration and turn timers.
    pub tick_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            regeneration_timeout_ms: 500,
            turn_hold_ms: 20,
            per_turn_quota: 8,
            recv_buffer_capacity: MAX_FRAME_LEN,
            send_queue_depth: 32,
            checksum: ChecksumKind::default(),
            bootstrap_holder: false,
            tick_interval_ms: 10,
        }
    }
}

impl LinkConfig {
    /// Regeneration timeout as a [`Duration`].
    pub fn regeneration_timeout(&self) -> Duration {
        Duration::from_millis(self.regeneration_timeout_ms)
    }

    /// Turn hold time as a [`Duration`].
    pub fn turn_hold(&self) -> Duration {
        Duration::from_millis(self.turn_hold_ms)
    }

    /// Tick cadence as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.regeneration_timeout_ms == 0 {
            return Err(LinkError::Config(
                "regeneration_timeout_ms must be nonzero".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(LinkError::Config(
                "tick_interval_ms must be nonzero".to_string(),
            ));
        }
        if self.per_turn_quota == 0 {
            return Err(LinkError::Config(
                "per_turn_quota must be at least 1".to_string(),
            ));
        }
        if self.send_queue_depth == 0 {
            return Err(LinkError::Config(
                "send_queue_depth must be at least 1".to_string(),
            ));
        }
        if self.recv_buffer_capacity < MAX_FRAME_LEN {
            return Err(LinkError::Config(format!(
                "recv_buffer_capacity must hold one maximum frame ({MAX_FRAME_LEN} bytes)"
            )));
        }
        Ok(())
    }

    /// Parse and validate a configuration from a JSON string.
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
