//! Progress fan-out.
//!
//! Each subscriber gets its own bounded channel. Publishing never waits: an event is dropped
//! for a subscriber whose channel is full, and subscribers that hung up are pruned.

mod types;

#[cfg(test)]
mod tests;

pub use types::{ArticleProgress, ArticleStatus, EventKind, MatchSummary, ProgressEvent};

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::constants::DEFAULT_EVENT_CAPACITY;

#[derive(Debug)]
pub struct EventEmitter {
    subscribers: Mutex<Vec<mpsc::Sender<ProgressEvent>>>,
    capacity: usize,
    next_seq: AtomicU64,
    dropped: AtomicU64,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventEmitter {
    /// `capacity` is the per-subscriber buffer size.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.lock().push(tx);
        EventSubscriber { rx }
    }

    /// Live subscribers (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Events dropped because a subscriber's buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stamps `kind` with the next sequence number and publishes it.
    pub fn emit(&self, run_id: Uuid, kind: EventKind) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.publish(ProgressEvent {
            seq,
            run_id,
            emitted_at: Utc::now(),
            kind,
        });
        seq
    }

    /// Delivers `event` to every subscriber with room; returns how many received it.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.lock().retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(seq = event.seq, "Subscriber saturated, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct EventSubscriber {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl EventSubscriber {
    /// Next event, or `None` once the emitter is gone and the buffer is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains everything currently buffered.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_stream(self) -> ReceiverStream<ProgressEvent> {
        ReceiverStream::new(self.rx)
    }

    /// Writes each event to `out` as one JSON line until the emitter is gone.
    ///
    /// Stops at the first write error and returns it; the subscription is dropped with `self`.
    /// Returns the number of lines written otherwise.
    pub async fn write_json_lines<W>(mut self, out: &mut W) -> std::io::Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0usize;
        while let Some(event) = self.recv().await {
            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(seq = event.seq, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            line.push(b'\n');
            out.write_all(&line).await?;
            out.flush().await?;
            written += 1;
        }
        Ok(written)
    }
}
