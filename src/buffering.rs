//! Rate-decoupling stage backed by a [`CircularBuffer`].
//!
//! Two workers share one buffer. The ingestion worker moves every upstream
//! value into the buffer and never blocks on anything but its upstream. The
//! flush worker wakes once per interval, drains the buffer and forwards the
//! drained values in order. Anything beyond capacity between two flushes is
//! lost oldest-first.

use crate::buffer::CircularBuffer;
use crate::cancel::{CancellationToken, Received, Sent};
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{rendezvous, spawn_worker, Stage, StageContext, StageOutput, Stream};
use crossbeam::channel::{after, bounded, never, select, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of values held between flushes
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default time between flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Stage that buffers values and releases them on a fixed schedule
#[derive(Debug, Clone)]
pub struct BufferingStage {
    name: String,
    capacity: usize,
    flush_interval: Duration,
}

impl BufferingStage {
    /// Create a buffering stage holding up to `capacity` values, flushed every `flush_interval`
    pub fn new(capacity: usize, flush_interval: Duration) -> Self {
        Self {
            name: "buffer".to_string(),
            capacity,
            flush_interval,
        }
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the time between flushes
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

impl Default for BufferingStage {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL)
    }
}

impl Stage for BufferingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, upstream: Stream, ctx: &StageContext) -> Result<StageOutput> {
        if self.capacity == 0 {
            return Err(PipelineError::Config(format!(
                "stage {} needs a buffer capacity above zero",
                self.name
            )));
        }

        let buffer = Arc::new(CircularBuffer::new(self.capacity));
        let (downstream, stream) = rendezvous();
        // Never sent on; dropping the sender tells the flush worker that
        // ingestion is over.
        let (ingest_done_tx, ingest_done_rx) = bounded::<()>(0);

        let ingest = {
            let buffer = Arc::clone(&buffer);
            let cancel = ctx.cancel.clone();
            let metrics = ctx.metrics.clone();
            spawn_worker(&self.name, "ingest", ctx, move || {
                run_ingest(&upstream, &buffer, &cancel, &metrics);
                drop(ingest_done_tx);
            })?
        };

        let flush = {
            let cancel = ctx.cancel.clone();
            let metrics = ctx.metrics.clone();
            let interval = self.flush_interval;
            spawn_worker(&self.name, "flush", ctx, move || {
                run_flush(&buffer, downstream, &cancel, &metrics, interval, &ingest_done_rx);
            })?
        };

        Ok(StageOutput {
            stream,
            workers: vec![ingest, flush],
        })
    }
}

fn run_ingest(
    upstream: &Stream,
    buffer: &CircularBuffer<i64>,
    cancel: &CancellationToken,
    metrics: &StageMetrics,
) {
    loop {
        match cancel.recv(upstream) {
            Received::Item(value) => {
                metrics.record_received();
                if buffer.push(value) {
                    metrics.record_evicted();
                    warn!(
                        value,
                        evicted_total = buffer.evicted_count(),
                        "buffer full, oldest value evicted"
                    );
                } else {
                    debug!(value, "value buffered");
                }
            }
            Received::Closed => {
                warn!("upstream closed");
                return;
            }
            Received::Cancelled => {
                warn!("stage stopped by cancellation");
                return;
            }
        }
    }
}

/// Flush loop: Waiting -> Draining -> Waiting, or Waiting -> Cancelled.
///
/// Once ingestion has finished, the armed timer still runs to completion;
/// its drain is the last one. `downstream` is dropped on return, closing
/// the stage's output.
fn run_flush(
    buffer: &CircularBuffer<i64>,
    downstream: Sender<i64>,
    cancel: &CancellationToken,
    metrics: &StageMetrics,
    interval: Duration,
    ingest_done: &Receiver<()>,
) {
    let mut ingesting = true;
    let mut timer = after(interval);
    loop {
        // A disconnected channel is always ready, so stop watching it once seen.
        let done = if ingesting { ingest_done.clone() } else { never() };
        let wake = select! {
            recv(timer) -> _ => Wake::Tick,
            recv(done) -> _ => Wake::IngestDone,
            recv(cancel.signal()) -> _ => Wake::Cancelled,
        };

        match wake {
            Wake::Tick => {
                if !flush(buffer, &downstream, cancel, metrics) {
                    return;
                }
                if !ingesting {
                    debug!("final flush complete");
                    return;
                }
                timer = after(interval);
            }
            Wake::IngestDone => {
                debug!("ingestion finished, last flush at the next tick");
                ingesting = false;
            }
            Wake::Cancelled => {
                warn!("stage stopped by cancellation");
                return;
            }
        }
    }
}

enum Wake {
    Tick,
    IngestDone,
    Cancelled,
}

/// Drain the buffer and forward its contents. Returns false if the stage
/// must stop.
fn flush(
    buffer: &CircularBuffer<i64>,
    downstream: &Sender<i64>,
    cancel: &CancellationToken,
    metrics: &StageMetrics,
) -> bool {
    let values = buffer.drain();
    if values.is_empty() {
        debug!("buffer empty, nothing to flush");
        return true;
    }

    metrics.record_flush();
    info!(count = values.len(), "flushing buffer");
    debug!(?values, "flushed values");

    for value in values {
        match cancel.send(downstream, value) {
            Sent::Delivered => metrics.record_forwarded(),
            Sent::Closed => {
                warn!(value, "downstream closed, stopping");
                return false;
            }
            Sent::Cancelled => {
                warn!(value, "cancelled while flushing");
                return false;
            }
        }
    }
    true
}
