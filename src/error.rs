use thiserror::Error;

/// Result type for integer pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("Cannot build pipeline with no stages")]
    NoStages,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker for stage {stage}: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked before it could be joined
    #[error("Worker {0} panicked")]
    WorkerPanicked(String),

    /// Input token is neither an integer nor the exit sentinel
    #[error("Malformed input token {token:?}: {source}")]
    MalformedToken {
        token: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Token source failed while reading
    #[error("Token source failed: {0}")]
    Source(#[source] std::io::Error),

    /// Result sink failed while writing
    #[error("Result sink failed: {0}")]
    Sink(#[source] std::io::Error),
}
