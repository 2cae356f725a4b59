//! # ringlink
//!
//! Deterministic, collision-free link protocol for a closed loop of nodes
//! connected by point-to-point serial links. A circulating token grants
//! exclusive transmission rights; data frames carry application payloads
//! protected by a one-byte integrity check.
//!
//! ## Architecture
//!
//! - **Protocol core** ([`protocol`], [`station`], [`engine`]): pure state
//!   machines with no I/O. Raw bytes go in, frames and events come out,
//!   outgoing frames are handed back as wire bytes. One
//!   [`LinkEngine`](engine::LinkEngine) per node; engines are plain owned
//!   values, so a whole ring can be simulated in a single test.
//! - **Runtime glue** ([`node`]): binds an engine to any tokio
//!   `AsyncRead`/`AsyncWrite` transport with a single-owner engine task and
//!   a dedicated writer task.
//!
//! The physical transport (serial line setup, interrupts, flow control) is
//! an external collaborator: this crate consumes only a byte duplex.
//!
//! ## Example
//!
//! ```ignore
//! use ringlink::node::RingNode;
//! use ringlink::station::LinkEvent;
//!
//! #[tokio::main]
//! async fn main() -> ringlink::Result<()> {
//!     let (read_half, write_half) = open_serial_port();
//!     let mut node = RingNode::builder()
//!         .bootstrap_holder(true)
//!         .spawn(read_half, write_half)?;
//!
//!     let mut events = node.take_events().unwrap();
//!     while let Some(event) = events.recv().await {
//!         if let LinkEvent::DataReceived(payload) = event {
//!             println!("got {} bytes", payload.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod protocol;
pub mod station;

pub use config::LinkConfig;
pub use engine::{LinkEngine, LinkStats};
pub use error::{LinkError, Result};
pub use node::{RingNode, RingNodeBuilder, RingNodeHandle};
pub use protocol::{ChecksumKind, Frame, FrameDecoder};
pub use station::{LinkEvent, Station, StationState};
