use crate::state::StreamState;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Boxed error cause produced by transform mappings
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source or sink medium fault
    #[error("I/O fault: {0}")]
    Io(#[from] std::io::Error),

    /// Transform mapping fault, carrying the zero-based index of the
    /// offending chunk
    #[error("transform failed on chunk {index}")]
    Transform {
        index: u64,
        #[source]
        cause: BoxError,
    },

    /// Cooperative cancellation; not a fault
    #[error("pipeline cancelled")]
    Cancelled,

    /// A stage was asked to leave a state it cannot leave
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: StreamState, to: StreamState },

    /// A stage in a terminal state was handed more work
    #[error("stage is in a terminal state and accepts no further input")]
    Terminated,

    /// A sink was handed a chunk while at or above its high watermark
    #[error("sink buffer is at its high watermark")]
    BufferFull,

    /// Worker thread failure
    #[error("worker thread error: {0}")]
    Thread(String),

    /// Pipeline construction error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Terminal notification delivered exactly once per pipeline run.
#[derive(Debug)]
pub enum Completion {
    /// End of stream reached and the sink finalized.
    Finished,
    /// A stage faulted; output delivered before the fault stays delivered.
    Errored(PipelineError),
    /// The run was cancelled cooperatively.
    Cancelled,
}

impl Completion {
    /// Whether the run completed the success path.
    pub fn is_finished(&self) -> bool {
        matches!(self, Completion::Finished)
    }

    /// Convert into a `Result`, mapping cancellation to
    /// [`PipelineError::Cancelled`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Completion::Finished => Ok(()),
            Completion::Errored(e) => Err(e),
            Completion::Cancelled => Err(PipelineError::Cancelled),
        }
    }
}
