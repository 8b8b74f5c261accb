pub mod batch;
pub mod context;
pub mod controller;
pub mod errors;
pub mod executors;
pub mod queue;
pub mod registry;
pub mod status;

pub use batch::RunAllCoordinator;
pub use context::{ControllerConfig, ExecutionContext};
pub use controller::DocumentController;
pub use errors::ExecutionError;
pub use executors::{
    ExecutorSet, InputExecutor, PythonExecutor, SqlExecutor, VisualizationExecutor,
};
pub use queue::{ExecutionQueue, QueueTicket};
pub use registry::{RunningHandle, RunningRegistry};
pub use status::{BatchStatus, BlockStatus};
