use crate::buffering::BufferingStage;
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{FilterStage, Stage, StageContext, Stream, Worker};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    cancel: Option<CancellationToken>,
    diagnostics: Diagnostics,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            cancel: None,
            diagnostics: Diagnostics::disabled(),
        }
    }

    /// Append a stage; stages run in the order they are added
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Share an existing cancellation token with every stage.
    /// Without one the pipeline creates its own.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Route stage events to `diagnostics` instead of discarding them
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        Ok(Pipeline {
            stages: self.stages,
            cancel: self.cancel.unwrap_or_default(),
            diagnostics: self.diagnostics,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A linear chain of stages sharing one cancellation token
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    cancel: CancellationToken,
    diagnostics: Diagnostics,
}

impl Pipeline {
    /// The fixed chain: non-negative filter, multiple-of-three filter,
    /// then the buffering stage
    pub fn standard(
        config: &PipelineConfig,
        cancel: CancellationToken,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        config.validate()?;
        PipelineBuilder::new()
            .stage(FilterStage::non_negative())
            .stage(FilterStage::nonzero_multiple_of_three())
            .stage(BufferingStage::new(
                config.buffer_capacity,
                config.flush_interval,
            ))
            .with_cancellation(cancel)
            .with_diagnostics(diagnostics)
            .build()
    }

    /// Get the stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Get the shared cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wire every stage, feeding each stage's output into the next, and
    /// return the running chain.
    ///
    /// If a stage fails to start, the token is set so the stages already
    /// running shut down, and the error is returned.
    pub fn run(&self, source: Stream) -> Result<RunningPipeline> {
        let mut stream = source;
        let mut workers = Vec::new();
        let mut metrics = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            let ctx = StageContext {
                cancel: self.cancel.clone(),
                diagnostics: self.diagnostics.clone(),
                metrics: StageMetrics::new(),
            };

            self.diagnostics.in_scope(|| {
                debug!(number = index + 1, stage = stage.name(), "starting stage");
            });

            let output = match stage.transform(stream, &ctx) {
                Ok(output) => output,
                Err(e) => {
                    self.cancel.cancel();
                    if let Err(join_err) = join_all(workers) {
                        self.diagnostics.in_scope(|| {
                            warn!(error = %join_err, "worker failed while aborting start")
                        });
                    }
                    return Err(e);
                }
            };

            stream = output.stream;
            workers.extend(output.workers);
            metrics.push((stage.name().to_string(), ctx.metrics));
        }

        Ok(RunningPipeline {
            output: stream,
            workers,
            metrics,
            cancel: self.cancel.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// A running pipeline that can be drained, monitored and stopped
#[derive(Debug)]
pub struct RunningPipeline {
    output: Stream,
    workers: Vec<Worker>,
    metrics: Vec<(String, StageMetrics)>,
    cancel: CancellationToken,
    diagnostics: Diagnostics,
}

impl RunningPipeline {
    /// The last stage's output; closes once every stage has finished
    pub fn output(&self) -> &Stream {
        &self.output
    }

    /// Get the shared cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Set the shared token, asking every stage to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index).map(|(_, m)| m)
    }

    /// Get metrics for every stage, paired with the stage name
    pub fn metrics(&self) -> &[(String, StageMetrics)] {
        &self.metrics
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, (name, metrics)) in self.metrics.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                name,
                metrics.snapshot().format()
            ));
        }
        summary
    }

    /// Wait for every worker to exit
    pub fn join(self) -> Result<()> {
        let diagnostics = self.diagnostics.clone();
        let result = join_all(self.workers);
        diagnostics.in_scope(|| info!(ok = result.is_ok(), "pipeline stopped"));
        result
    }

    /// Wait for every worker, giving up and cancelling after `timeout`
    pub fn join_timeout(self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.workers.iter().any(|w| !w.handle.is_finished()) {
            if Instant::now() >= deadline {
                self.diagnostics
                    .in_scope(|| warn!(?timeout, "pipeline still running, cancelling"));
                self.cancel.cancel();
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.join()
    }

    /// Cancel and wait for every worker to exit
    pub fn shutdown(self) -> Result<()> {
        self.cancel();
        self.join()
    }
}

fn join_all(workers: Vec<Worker>) -> Result<()> {
    let mut first_error = None;
    for worker in workers {
        if worker.handle.join().is_err() && first_error.is_none() {
            first_error = Some(PipelineError::WorkerPanicked(worker.name));
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
