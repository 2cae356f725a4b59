//! Error types for ringlink.

use thiserror::Error;

/// Main error type for all link-engine operations.
///
/// Nothing in this taxonomy is fatal to the engine: overflow and send-side
/// rejections are resolved by the caller (backpressure or retry on a later
/// turn), and corrupted frames never surface here at all: they are counted
/// in [`LinkStats`](crate::engine::LinkStats) and the parser resynchronizes.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// The pending-bytes buffer is full; the fed chunk was rejected whole.
    #[error("receive buffer overflow (capacity {capacity} bytes)")]
    Overflow {
        /// Fixed capacity of the pending-bytes buffer.
        capacity: usize,
    },

    /// Payload exceeds what a single data frame can carry on the wire.
    #[error("payload of {len} bytes exceeds frame limit of {max}")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Maximum payload length per data frame.
        max: usize,
    },

    /// Send attempted while this node does not hold the token.
    ///
    /// Returned synchronously; the caller retries on its next turn.
    #[error("not holding the token")]
    NotHolder,

    /// The bounded send queue is full; retry on a later turn.
    #[error("send queue full (depth {depth})")]
    QueueFull {
        /// Configured depth of the send queue.
        depth: usize,
    },

    /// The engine task or writer task is gone.
    #[error("link closed")]
    ChannelClosed,
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
