pub mod errors;
pub mod kernel;
pub mod operation;
pub mod scripted;

pub use errors::RuntimeError;
pub use kernel::{
    DocumentScope, KernelRuntime, PythonError, PythonResult, SqlResult, VisualizationResult,
};
pub use operation::{AbortFn, Operation};
pub use scripted::{CallGate, ResultGate, ScriptedRuntime};
