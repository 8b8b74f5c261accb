use crate::queue::ExecutionQueue;
use crate::registry::RunningRegistry;
use crate::status::BlockStatus;
use folio_doc::{BlockId, BlockType, DocumentStore};
use folio_runtime::{DocumentScope, KernelRuntime};
use std::sync::Arc;

/// Tunables for a document's controller. One config per controller, defaulted
/// the way the document editor ships it.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Block kinds a run-all batch executes, in document order.
    pub run_all_types: Vec<BlockType>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            run_all_types: vec![
                BlockType::Input,
                BlockType::Sql,
                BlockType::Python,
                BlockType::Visualization,
            ],
        }
    }
}

/// Everything the executors of one document share: the document contract,
/// the kernel, the queue, and the running registry. Scoped strictly per
/// document and constructor-injected; never a process-wide singleton.
pub struct ExecutionContext {
    pub scope: DocumentScope,
    pub doc: Arc<dyn DocumentStore>,
    pub runtime: Arc<dyn KernelRuntime>,
    pub queue: ExecutionQueue,
    pub running: RunningRegistry,
}

impl ExecutionContext {
    /// Must be called from within a tokio runtime (spawns the queue worker).
    pub fn new(
        scope: DocumentScope,
        doc: Arc<dyn DocumentStore>,
        runtime: Arc<dyn KernelRuntime>,
    ) -> Arc<Self> {
        Arc::new(Self {
            scope,
            doc,
            runtime,
            queue: ExecutionQueue::new(),
            running: RunningRegistry::new(),
        })
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub(crate) fn set_status(&self, block: &BlockId, status: BlockStatus) {
        status.write(self.doc.as_ref(), block);
    }

    /// Writes the terminal `idle` status unless a superseding run has already
    /// registered; its own status writes must not be clobbered.
    pub(crate) fn settle_status(&self, block: &BlockId) {
        if !self.running.is_running(block) {
            self.set_status(block, BlockStatus::Idle);
        }
    }
}
