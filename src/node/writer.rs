//! Dedicated writer task for outgoing frames.
//!
//! The engine task never touches the transport's write half directly: it
//! hands encoded frames to this task over an mpsc channel and moves on.
//! Sending is fire-and-forget from the engine's perspective: completion
//! happens asynchronously inside this task, and the engine is never blocked
//! behind a slow serial line.
//!
//! # Architecture
//!
//! ```text
//! Engine task ─► mpsc::Sender<Bytes> ─► Writer Task ─► serial write half
//! ```
//!
//! Frames that are ready together are batched into a single vectored write;
//! partial writes are retried with the remainder until the batch is fully
//! on the wire (the transport is allowed to accept fewer bytes per call).

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{LinkError, Result};

/// Default capacity of the outbound frame channel.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Maximum frames coalesced into a single vectored write.
const MAX_BATCH_SIZE: usize = 16;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Capacity of the outbound frame channel; the transmission-side
    /// backpressure bound.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Handle for queueing encoded frames to the writer task.
///
/// Cheaply cloneable; all clones feed the same channel.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    capacity: usize,
}

impl WriterHandle {
    /// Queue a frame, waiting for channel capacity if necessary.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| LinkError::ChannelClosed)
    }

    /// Queue a frame without waiting.
    ///
    /// Fails with [`LinkError::QueueFull`] when the channel is at capacity.
    pub fn try_send(&self, frame: Bytes) -> Result<()> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LinkError::QueueFull {
                depth: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => LinkError::ChannelClosed,
        })
    }
}

/// Spawn the writer task over the transport's write half.
///
/// Returns a handle for queueing frames and the task's join handle. The
/// task exits cleanly when every handle is dropped, or with an error when
/// the transport fails.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let handle = WriterHandle {
        tx,
        capacity: config.channel_capacity,
    };
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Main writer loop: receive frames, batch what is ready, write.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch of frames with vectored I/O, retrying partial writes
/// until the whole batch is on the wire.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = batch.iter().map(Bytes::len).sum();
    let mut written = 0;

    while written < total {
        let slices = remaining_slices(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "transport accepted zero bytes",
            )));
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// Build the IoSlice list for the unwritten tail of a batch.
fn remaining_slices(batch: &[Bytes], skip: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.len();
        if skip < end {
            let start = skip.saturating_sub(offset);
            slices.push(IoSlice::new(&frame[start..]));
        }
        offset = end;
    }

    slices
}
