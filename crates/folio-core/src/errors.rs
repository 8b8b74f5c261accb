use folio_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The distinguished cancellation condition. Queue eviction and the
    /// executor checkpoint both settle with this; executors swallow it before
    /// it reaches their callers.
    #[error("execution cancelled")]
    Cancelled,
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("manual run controls are disabled during a scheduled run")]
    ManualControlsDisabled,
    #[error("unknown block: {0}")]
    UnknownBlock(String),
    #[error("executor invariant violated: {0}")]
    InvariantViolation(String),
}

impl ExecutionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
