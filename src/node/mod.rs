//! Async runtime glue: binds a [`LinkEngine`](crate::engine::LinkEngine)
//! to a byte-duplex transport.
//!
//! The transport is anything implementing tokio's `AsyncRead`/`AsyncWrite`
//! split: a serial port, a Unix socket, or an in-process duplex pipe for
//! simulating a whole ring in tests.

mod runtime;
mod writer;

pub use runtime::{RingNode, RingNodeBuilder, RingNodeHandle, DEFAULT_EVENT_CAPACITY};
pub use writer::{spawn_writer_task, WriterConfig, WriterHandle, DEFAULT_OUTBOUND_CAPACITY};
