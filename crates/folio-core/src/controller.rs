use crate::batch::RunAllCoordinator;
use crate::context::{ControllerConfig, ExecutionContext};
use crate::errors::ExecutionError;
use crate::executors::ExecutorSet;
use folio_doc::{BlockId, BlockType, DocumentStore};
use folio_runtime::{DocumentScope, KernelRuntime};
use std::sync::Arc;

/// Per-document entry point: owns the document's queue, running registry,
/// executors, and run-all coordinator. One controller per open document;
/// documents are fully independent and execute in parallel.
pub struct DocumentController {
    ctx: Arc<ExecutionContext>,
    executors: Arc<ExecutorSet>,
    run_all: RunAllCoordinator,
}

impl DocumentController {
    /// Must be called from within a tokio runtime (spawns the queue worker).
    pub fn new(
        scope: DocumentScope,
        doc: Arc<dyn DocumentStore>,
        runtime: Arc<dyn KernelRuntime>,
    ) -> Self {
        Self::with_config(scope, doc, runtime, ControllerConfig::default())
    }

    pub fn with_config(
        scope: DocumentScope,
        doc: Arc<dyn DocumentStore>,
        runtime: Arc<dyn KernelRuntime>,
        config: ControllerConfig,
    ) -> Self {
        let ctx = ExecutionContext::new(scope, doc, runtime);
        let executors = Arc::new(ExecutorSet::new(&ctx));
        let run_all = RunAllCoordinator::new(
            Arc::clone(&ctx),
            Arc::clone(&executors),
            config.run_all_types,
        );
        Self {
            ctx,
            executors,
            run_all,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.is_idle()
    }

    /// Executes one block by its document type. Run-all blocks run their
    /// whole batch.
    pub async fn execute_block(&self, block: &BlockId) -> Result<(), ExecutionError> {
        match self.block_type(block)? {
            BlockType::RunAll => self.run_all.run_all(block).await,
            block_type => self.executors.execute(block, block_type).await,
        }
    }

    /// Aborts whatever is in flight for a block; for run-all blocks this
    /// aborts the whole batch.
    pub async fn abort_block(&self, block: &BlockId) -> Result<(), ExecutionError> {
        match self.block_type(block)? {
            BlockType::RunAll => self.run_all.abort_all(block).await,
            _ => {
                self.executors.abort(block).await;
                Ok(())
            }
        }
    }

    pub async fn run_all(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        self.run_all.run_all(batch_block).await
    }

    pub async fn abort_all(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        self.run_all.abort_all(batch_block).await
    }

    pub fn enter_scheduled_run(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        self.run_all.enter_scheduled_run(batch_block)
    }

    pub fn leave_scheduled_run(&self, batch_block: &BlockId) {
        self.run_all.leave_scheduled_run(batch_block)
    }

    /// Direct access to the input executor's save entry points.
    pub fn input(&self) -> &crate::executors::InputExecutor {
        &self.executors.input
    }

    fn block_type(&self, block: &BlockId) -> Result<BlockType, ExecutionError> {
        self.ctx
            .doc
            .blocks()
            .into_iter()
            .find_map(|(id, block_type)| (id == *block).then_some(block_type))
            .ok_or_else(|| ExecutionError::UnknownBlock(block.to_string()))
    }
}
