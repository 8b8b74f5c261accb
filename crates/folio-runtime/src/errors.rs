use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("kernel unavailable: {0}")]
    KernelUnavailable(String),
    #[error("kernel operation failed: {0}")]
    OperationFailed(String),
}
