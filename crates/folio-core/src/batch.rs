use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::executors::{abort_block, ExecutorSet};
use crate::status::BatchStatus;
use folio_doc::{BlockId, BlockType};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

struct BatchProgress {
    remaining: u32,
}

/// Coordinates a run-all batch: enqueues every runnable block as one batch,
/// keeps `{total, remaining, status}` on the run-all block, and maps the
/// aggregate status onto per-block enqueue/abort calls.
///
/// The status lives in the document, so every client sees the same batch
/// state; this coordinator is its only writer for a given document.
pub struct RunAllCoordinator {
    ctx: Arc<ExecutionContext>,
    executors: Arc<ExecutorSet>,
    run_all_types: Vec<BlockType>,
    progress: Mutex<Option<BatchProgress>>,
}

impl RunAllCoordinator {
    pub fn new(
        ctx: Arc<ExecutionContext>,
        executors: Arc<ExecutorSet>,
        run_all_types: Vec<BlockType>,
    ) -> Self {
        Self {
            ctx,
            executors,
            run_all_types,
            progress: Mutex::new(None),
        }
    }

    /// Runs every runnable block in document order as one batch. All members
    /// are enqueued up front and interleave FIFO with any concurrently
    /// requested single-block run. Resolves once the whole batch has settled.
    pub async fn run_all(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        let doc = self.ctx.doc.as_ref();
        let status = BatchStatus::read(doc, batch_block);
        if status == BatchStatus::ScheduleRunning {
            return Err(ExecutionError::ManualControlsDisabled);
        }
        if status.is_active() || status == BatchStatus::Unknown {
            warn!(
                workspace = %self.ctx.scope.workspace_id,
                document = %self.ctx.scope.document_id,
                block = %batch_block,
                ?status,
                "ignoring run-all request while batch is not idle"
            );
            return Ok(());
        }

        let members: Vec<(BlockId, BlockType)> = self
            .ctx
            .doc
            .blocks()
            .into_iter()
            .filter(|(id, block_type)| {
                id != batch_block && self.run_all_types.contains(block_type)
            })
            .collect();
        let total = members.len() as u32;

        BatchStatus::RunRequested.write(doc, batch_block);
        doc.set_attribute(batch_block, "total", json!(total));
        doc.set_attribute(batch_block, "remaining", json!(total));
        *self.progress.lock().expect("batch lock poisoned") =
            Some(BatchProgress { remaining: total });
        info!(
            workspace = %self.ctx.scope.workspace_id,
            document = %self.ctx.scope.document_id,
            block = %batch_block,
            total,
            "run-all batch requested"
        );

        if members.is_empty() {
            self.finish(batch_block);
            return Ok(());
        }

        BatchStatus::Running.write(doc, batch_block);

        // First poll of each member future enqueues it, so the whole batch is
        // admitted in document order before anything runs.
        let runs = members.into_iter().map(|(id, block_type)| async move {
            // Member failures are already recorded on the member's own
            // attributes; for the batch every settle counts as one done.
            let _ = self.executors.execute(&id, block_type).await;
            self.note_member_settled(batch_block);
        });
        futures::future::join_all(runs).await;
        Ok(())
    }

    /// Aborts an in-flight batch: signals every outstanding handle, then
    /// drains them; `aborting` persists until the last one settles.
    pub async fn abort_all(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        let doc = self.ctx.doc.as_ref();
        let status = BatchStatus::read(doc, batch_block);
        if status == BatchStatus::ScheduleRunning {
            return Err(ExecutionError::ManualControlsDisabled);
        }
        if !matches!(status, BatchStatus::RunRequested | BatchStatus::Running) {
            return Ok(());
        }

        BatchStatus::AbortRequested.write(doc, batch_block);
        let outstanding = self.ctx.running.running_blocks();
        for block in &outstanding {
            self.ctx.running.cancel(block);
        }
        BatchStatus::Aborting.write(doc, batch_block);
        info!(
            workspace = %self.ctx.scope.workspace_id,
            document = %self.ctx.scope.document_id,
            block = %batch_block,
            outstanding = outstanding.len(),
            "aborting run-all batch"
        );

        for block in &outstanding {
            abort_block(&self.ctx, block).await;
        }

        *self.progress.lock().expect("batch lock poisoned") = None;
        BatchStatus::Idle.write(doc, batch_block);
        Ok(())
    }

    /// Marks the batch as driven by the external scheduler; manual run/abort
    /// calls are rejected until [`Self::leave_scheduled_run`].
    pub fn enter_scheduled_run(&self, batch_block: &BlockId) -> Result<(), ExecutionError> {
        let doc = self.ctx.doc.as_ref();
        let status = BatchStatus::read(doc, batch_block);
        if status.is_active() {
            return Err(ExecutionError::InvariantViolation(
                "cannot enter a scheduled run while a batch is active".to_string(),
            ));
        }
        BatchStatus::ScheduleRunning.write(doc, batch_block);
        Ok(())
    }

    pub fn leave_scheduled_run(&self, batch_block: &BlockId) {
        let doc = self.ctx.doc.as_ref();
        if BatchStatus::read(doc, batch_block) == BatchStatus::ScheduleRunning {
            BatchStatus::Idle.write(doc, batch_block);
        }
    }

    fn note_member_settled(&self, batch_block: &BlockId) {
        let doc = self.ctx.doc.as_ref();
        let mut progress = self.progress.lock().expect("batch lock poisoned");
        let Some(state) = progress.as_mut() else {
            // Stale settle after the batch was finalized elsewhere.
            return;
        };
        let status = BatchStatus::read(doc, batch_block);
        if !matches!(status, BatchStatus::Running | BatchStatus::Aborting) {
            return;
        }

        if state.remaining > 0 {
            state.remaining -= 1;
        }
        doc.set_attribute(batch_block, "remaining", json!(state.remaining));

        if state.remaining == 0 && status == BatchStatus::Running {
            *progress = None;
            drop(progress);
            self.finish(batch_block);
        }
    }

    fn finish(&self, batch_block: &BlockId) {
        let doc = self.ctx.doc.as_ref();
        *self.progress.lock().expect("batch lock poisoned") = None;
        BatchStatus::Completed.write(doc, batch_block);
        // `completed` is transient; the resting state is idle.
        BatchStatus::Idle.write(doc, batch_block);
        info!(
            workspace = %self.ctx.scope.workspace_id,
            document = %self.ctx.scope.document_id,
            block = %batch_block,
            "run-all batch completed"
        );
    }
}
