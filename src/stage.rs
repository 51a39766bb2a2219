use crate::cancel::{CancellationToken, Received, Sent};
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, info_span, warn};

/// The consuming end of a link between two stages
pub type Stream = Receiver<i64>;

/// Create an unbuffered link: a send completes only when a receiver takes it
pub fn rendezvous() -> (Sender<i64>, Stream) {
    bounded(0)
}

/// Everything a stage receives from the pipeline besides its input
#[derive(Debug, Clone)]
pub struct StageContext {
    pub cancel: CancellationToken,
    pub diagnostics: Diagnostics,
    pub metrics: StageMetrics,
}

/// A named worker thread spawned by a stage
#[derive(Debug)]
pub struct Worker {
    pub name: String,
    pub handle: JoinHandle<()>,
}

/// What a stage hands back after wiring itself in
#[derive(Debug)]
pub struct StageOutput {
    /// Values the stage emits; closed when the stage is done
    pub stream: Stream,
    /// Threads the stage started
    pub workers: Vec<Worker>,
}

/// A unit of concurrent work turning one stream into another.
///
/// `transform` must return promptly: the actual work happens on threads it
/// spawns. The stage owns the sending half of its output and is the only
/// one allowed to close it.
pub trait Stage: Send + Sync {
    /// Get a human-readable name for this stage
    fn name(&self) -> &str;

    /// Start consuming `upstream` and return the downstream stream
    fn transform(&self, upstream: Stream, ctx: &StageContext) -> Result<StageOutput>;
}

/// Spawn a named thread that runs `body` under the stage's diagnostics
/// and a span carrying the stage name.
pub fn spawn_worker<F>(stage: &str, role: &str, ctx: &StageContext, body: F) -> Result<Worker>
where
    F: FnOnce() + Send + 'static,
{
    let name = format!("{}-{}", stage, role);
    let diagnostics = ctx.diagnostics.clone();
    let span_stage = stage.to_string();
    let span_role = role.to_string();

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            diagnostics.in_scope(|| {
                let span = info_span!("stage", stage = %span_stage, worker = %span_role);
                let _entered = span.enter();
                body()
            })
        })
        .map_err(|source| PipelineError::Spawn {
            stage: stage.to_string(),
            source,
        })?;

    Ok(Worker { name, handle })
}

/// Forward iff the value is zero or positive
pub fn keep_non_negative(value: i64) -> bool {
    value >= 0
}

/// Forward iff the value is a multiple of three other than zero
pub fn keep_nonzero_multiple_of_three(value: i64) -> bool {
    value != 0 && value % 3 == 0
}

/// A stateless stage that passes through values matching a predicate
pub struct FilterStage<P>
where
    P: Fn(i64) -> bool + Send + Sync + 'static,
{
    name: String,
    predicate: Arc<P>,
}

impl<P> FilterStage<P>
where
    P: Fn(i64) -> bool + Send + Sync + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: P) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl FilterStage<fn(i64) -> bool> {
    /// Drops negative values
    pub fn non_negative() -> Self {
        Self::new("non_negative", keep_non_negative as fn(i64) -> bool)
    }

    /// Keeps only non-zero multiples of three
    pub fn nonzero_multiple_of_three() -> Self {
        Self::new(
            "multiple_of_three",
            keep_nonzero_multiple_of_three as fn(i64) -> bool,
        )
    }
}

impl<P> std::fmt::Debug for FilterStage<P>
where
    P: Fn(i64) -> bool + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStage").field("name", &self.name).finish()
    }
}

impl<P> Stage for FilterStage<P>
where
    P: Fn(i64) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, upstream: Stream, ctx: &StageContext) -> Result<StageOutput> {
        let (downstream, stream) = rendezvous();
        let predicate = Arc::clone(&self.predicate);
        let cancel = ctx.cancel.clone();
        let metrics = ctx.metrics.clone();

        let worker = spawn_worker(&self.name, "filter", ctx, move || {
            run_filter(&upstream, downstream, &cancel, &metrics, predicate.as_ref());
        })?;

        Ok(StageOutput {
            stream,
            workers: vec![worker],
        })
    }
}

/// Filter loop. `downstream` is dropped on every return path, which closes
/// the stage's output.
fn run_filter<P>(
    upstream: &Stream,
    downstream: Sender<i64>,
    cancel: &CancellationToken,
    metrics: &StageMetrics,
    predicate: &P,
) where
    P: Fn(i64) -> bool + ?Sized,
{
    loop {
        let value = match cancel.recv(upstream) {
            Received::Item(value) => value,
            Received::Closed => {
                warn!("upstream closed");
                return;
            }
            Received::Cancelled => {
                warn!("stage stopped by cancellation");
                return;
            }
        };

        metrics.record_received();
        debug!(value, "received value");

        if !predicate(value) {
            metrics.record_rejected();
            debug!(value, "value rejected");
            continue;
        }

        match cancel.send(&downstream, value) {
            Sent::Delivered => {
                metrics.record_forwarded();
                info!(value, "value passed filter");
            }
            Sent::Closed => {
                warn!(value, "downstream closed, stopping");
                return;
            }
            Sent::Cancelled => {
                warn!(value, "cancelled while sending");
                return;
            }
        }
    }
}
