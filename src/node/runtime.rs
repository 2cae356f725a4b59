//! Ring node runtime: engine task, command channel, event stream.
//!
//! [`RingNodeBuilder`] configures a node and [`RingNodeBuilder::spawn`]
//! wires it to a transport's read/write halves. The engine lives inside a
//! single task that serializes its three call sites (transport reads, the
//! periodic tick, and application commands) with `tokio::select!`, so the
//! protocol state never needs a lock.
//!
//! # Example
//!
//! ```ignore
//! use ringlink::node::RingNode;
//!
//! let (read_half, write_half) = open_serial_port()?;
//! let mut node = RingNode::builder()
//!     .bootstrap_holder(true)
//!     .spawn(read_half, write_half)?;
//!
//! let mut events = node.take_events().unwrap();
//! let handle = node.handle();
//!
//! handle.send(&b"hello ring"[..]).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::writer::{spawn_writer_task, WriterConfig, WriterHandle};
use crate::config::LinkConfig;
use crate::engine::{LinkEngine, LinkStats};
use crate::error::{LinkError, Result};
use crate::protocol::ChecksumKind;
use crate::station::LinkEvent;

/// Default capacity of the upward event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Capacity of the application command channel.
const COMMAND_CAPACITY: usize = 16;

/// Read buffer size for the transport's receive path.
const READ_CHUNK: usize = 256;

/// Application commands serviced by the engine task.
enum Command {
    Send {
        payload: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Stats {
        reply: oneshot::Sender<LinkStats>,
    },
}

/// Builder for configuring and spawning a ring node.
pub struct RingNodeBuilder {
    config: LinkConfig,
    writer_config: WriterConfig,
    event_capacity: usize,
}

impl RingNodeBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            writer_config: WriterConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Replace the whole link configuration.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Start this node holding the token (exactly one node per ring).
    pub fn bootstrap_holder(mut self, bootstrap: bool) -> Self {
        self.config.bootstrap_holder = bootstrap;
        self
    }

    /// Silence tolerated before this node regenerates a token.
    pub fn regeneration_timeout(mut self, timeout: Duration) -> Self {
        self.config.regeneration_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Checksum algorithm; must match the rest of the ring.
    pub fn checksum(mut self, kind: ChecksumKind) -> Self {
        self.config.checksum = kind;
        self
    }

    /// Maximum data frames transmitted per turn.
    pub fn per_turn_quota(mut self, quota: usize) -> Self {
        self.config.per_turn_quota = quota;
        self
    }

    /// Capacity of the upward event channel. A lagging consumer loses
    /// events (with a warning) rather than stalling the engine.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Capacity of the outbound frame channel to the writer task.
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Validate the configuration and spawn the node over a transport.
    ///
    /// `reader` and `writer` are the transport's receive and transmit
    /// halves; bytes are consumed in arrival order and written frames may
    /// be split by the transport (partial writes are retried internally).
    pub fn spawn<R, W>(self, reader: R, writer: W) -> Result<RingNode>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let engine = LinkEngine::new(&self.config)?;
        let tick_interval = self.config.tick_interval();

        let (writer_handle, writer_task) = spawn_writer_task(writer, self.writer_config);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity);

        let engine_task = tokio::spawn(engine_loop(
            engine,
            reader,
            writer_handle,
            command_rx,
            event_tx,
            tick_interval,
        ));

        Ok(RingNode {
            handle: RingNodeHandle {
                commands: command_tx,
            },
            events: Some(event_rx),
            engine_task,
            _writer_task: writer_task,
        })
    }
}

impl Default for RingNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running ring node bound to one transport.
pub struct RingNode {
    handle: RingNodeHandle,
    events: Option<mpsc::Receiver<LinkEvent>>,
    engine_task: JoinHandle<Result<()>>,
    _writer_task: JoinHandle<Result<()>>,
}

impl RingNode {
    /// Create a node builder.
    pub fn builder() -> RingNodeBuilder {
        RingNodeBuilder::new()
    }

    /// Clone a handle for sending data and querying stats.
    pub fn handle(&self) -> RingNodeHandle {
        self.handle.clone()
    }

    /// Take the upward event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<LinkEvent>> {
        self.events.take()
    }

    /// Wait for the engine task to finish (transport closed or failed).
    pub async fn join(self) -> Result<()> {
        match self.engine_task.await {
            Ok(result) => result,
            Err(_) => Err(LinkError::ChannelClosed),
        }
    }
}

/// Handle for talking to a running node.
///
/// Cheaply cloneable; all clones feed the same engine task.
#[derive(Debug, Clone)]
pub struct RingNodeHandle {
    commands: mpsc::Sender<Command>,
}

impl RingNodeHandle {
    /// Queue application data for transmission during this node's turn.
    ///
    /// Resolves synchronously with respect to the engine: the reply carries
    /// [`LinkError::NotHolder`] outside a turn (retry on the next turn),
    /// [`LinkError::PayloadTooLarge`] over the wire limit, or
    /// [`LinkError::QueueFull`] when the turn queue is full.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                payload: payload.into(),
                reply,
            })
            .await
            .map_err(|_| LinkError::ChannelClosed)?;
        response.await.map_err(|_| LinkError::ChannelClosed)?
    }

    /// Snapshot the engine's counters.
    pub async fn stats(&self) -> Result<LinkStats> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| LinkError::ChannelClosed)?;
        response.await.map_err(|_| LinkError::ChannelClosed)
    }
}

/// Single-owner engine loop: serializes transport reads, ticks, and
/// application commands, then pumps outgoing frames and events after
/// every step.
async fn engine_loop<R>(
    mut engine: LinkEngine,
    mut reader: R,
    writer: WriterHandle,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<LinkEvent>,
    tick_interval: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();
    let mut buf = vec![0u8; READ_CHUNK];

    // A bootstrap holder has events queued before any traffic arrives.
    pump(&mut engine, &writer, &events).await?;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                // Transport closed: the node winds down cleanly.
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = engine.feed(&buf[..n]) {
                        tracing::warn!(bytes = n, error = %e, "dropping received chunk");
                    }
                }
                Err(e) => return Err(e.into()),
            },
            now = ticker.tick() => {
                engine.tick(now.duration_since(last_tick));
                last_tick = now;
            }
            command = commands.recv() => match command {
                Some(Command::Send { payload, reply }) => {
                    let _ = reply.send(engine.send(payload));
                }
                Some(Command::Stats { reply }) => {
                    let _ = reply.send(engine.stats());
                }
                // Every handle dropped: the application is done with us.
                None => break,
            },
        }

        pump(&mut engine, &writer, &events).await?;
    }

    Ok(())
}

/// Drain outgoing frames to the writer task and events to the application.
async fn pump(
    engine: &mut LinkEngine,
    writer: &WriterHandle,
    events: &mpsc::Sender<LinkEvent>,
) -> Result<()> {
    while let Some(frame) = engine.poll_outgoing() {
        writer.send(frame).await?;
    }
    while let Some(event) = engine.poll_event() {
        match events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(?event, "event receiver lagging, dropping event");
            }
            // Receiver dropped: the application stopped listening.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
    Ok(())
}
