//! A concurrent integer stream pipeline.
//!
//! Values flow through a linear chain of stages. Every stage runs on its
//! own threads and hands values to the next one over an unbuffered
//! rendezvous link, so a slow consumer slows the filters down. A single
//! [`CancellationToken`] is shared by every stage and stops them all at
//! once, even in the middle of a blocked send or receive.
//!
//! # Features
//!
//! - Filter stages built from plain predicates
//! - A buffering stage that never blocks its producer: values go into a
//!   fixed-capacity [`CircularBuffer`] that overwrites its oldest entry and
//!   is flushed downstream on a fixed interval
//! - Per-stage counters: received, forwarded, rejected, evicted, flushes
//! - Injected `tracing` diagnostics, no global subscriber
//!
//! # Example
//!
//! ```no_run
//! use int_pipeline::{rendezvous, CancellationToken, Diagnostics, Pipeline, PipelineConfig};
//!
//! # fn main() -> int_pipeline::Result<()> {
//! let cancel = CancellationToken::new();
//! let pipeline = Pipeline::standard(&PipelineConfig::default(), cancel.clone(), Diagnostics::disabled())?;
//!
//! let (input, source) = rendezvous();
//! let running = pipeline.run(source)?;
//!
//! std::thread::spawn(move || {
//!     for value in [-3, 0, 3, 6] {
//!         let _ = input.send(value);
//!     }
//! });
//!
//! for value in running.output().iter() {
//!     println!("{}", value);
//! }
//! running.join()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod buffering;
pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stage;

// Re-exports for convenience
pub use buffer::CircularBuffer;
pub use buffering::BufferingStage;
pub use cancel::{CancellationToken, Received, Sent};
pub use config::PipelineConfig;
pub use diagnostics::Diagnostics;
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, RunningPipeline};
pub use sink::render;
pub use source::{parse_token, read_tokens, SourceSummary, Token};
pub use stage::{
    keep_non_negative, keep_nonzero_multiple_of_three, rendezvous, FilterStage, Stage,
    StageContext, StageOutput, Stream, Worker,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
