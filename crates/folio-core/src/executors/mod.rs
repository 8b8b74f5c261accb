//! Block executors: one per executable block kind, all built on a single
//! driver that owns queue admission, registration, and the cancellation
//! checkpoint. Executors differ only in their validate / perform / commit
//! hooks.

mod input;
mod python;
mod sql;
mod visualization;

pub use input::InputExecutor;
pub use python::PythonExecutor;
pub use sql::SqlExecutor;
pub use visualization::VisualizationExecutor;

use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::registry::RunningHandle;
use crate::status::BlockStatus;
use folio_doc::{BlockId, BlockType};
use folio_runtime::{Operation, RuntimeError};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Inline error code for a variable name failing validation.
pub const INVALID_VARIABLE_NAME: &str = "invalid-variable-name";
/// Inline error code for an SQL block with no query text.
pub const EMPTY_QUERY: &str = "empty-query";
/// Inline error code for a chart with no source block reference.
pub const MISSING_SOURCE: &str = "missing-source";

/// Kernel-side variable names: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

type PerformFuture<T> = BoxFuture<'static, Result<Operation<T>, RuntimeError>>;

/// Runs one block execution attempt end to end: register a cancellation
/// handle, enqueue, perform the kernel call inside the queued task, check the
/// token once at the documented point, then commit or record the failure.
///
/// The checkpoint placement is deliberate and exclusive: cancellation is
/// only honored if observed after the kernel call returns and before its
/// result is awaited. A cancellation that lands once the result is being
/// awaited does not suppress the commit — last observed state wins.
pub(crate) async fn run_block<T, P, C, F>(
    ctx: &Arc<ExecutionContext>,
    block: &BlockId,
    perform: P,
    commit: C,
    record_failure: F,
) -> Result<(), ExecutionError>
where
    T: Send + 'static,
    P: FnOnce(Arc<ExecutionContext>, BlockId) -> PerformFuture<T> + Send + 'static,
    C: FnOnce(&ExecutionContext, &BlockId, T) + Send + 'static,
    F: FnOnce(&ExecutionContext, &BlockId, &RuntimeError) + Send + 'static,
{
    let attempt_id = Uuid::new_v4();
    let token = CancellationToken::new();
    let (settled_tx, settled_rx) = oneshot::channel();
    ctx.running
        .register(block, RunningHandle::new(attempt_id, token.clone(), settled_rx));
    ctx.set_status(block, BlockStatus::Enqueued);
    debug!(
        workspace = %ctx.scope.workspace_id,
        document = %ctx.scope.document_id,
        block = %block,
        "enqueued block execution"
    );

    let task = {
        let ctx = Arc::clone(ctx);
        let block = block.clone();
        let token = token.clone();
        async move {
            // Dropped on every exit path, settling the registry waiter.
            let _settled = settled_tx;
            ctx.set_status(&block, BlockStatus::Running);

            let operation = match perform(Arc::clone(&ctx), block.clone()).await {
                Ok(operation) => operation,
                Err(error) => {
                    warn!(
                        workspace = %ctx.scope.workspace_id,
                        document = %ctx.scope.document_id,
                        block = %block,
                        %error,
                        "kernel call failed"
                    );
                    record_failure(&ctx, &block, &error);
                    ctx.running.clear_if(&block, attempt_id);
                    ctx.settle_status(&block);
                    return Err(ExecutionError::Runtime(error));
                }
            };

            // The cancellation checkpoint.
            if token.is_cancelled() {
                (operation.abort)().await;
                ctx.running.clear_if(&block, attempt_id);
                ctx.settle_status(&block);
                return Err(ExecutionError::Cancelled);
            }

            let outcome = operation.result.await;
            ctx.running.clear_if(&block, attempt_id);
            match outcome {
                Ok(value) => {
                    commit(&ctx, &block, value);
                    ctx.set_status(&block, BlockStatus::Completed);
                    ctx.settle_status(&block);
                    Ok(())
                }
                Err(error) => {
                    warn!(
                        workspace = %ctx.scope.workspace_id,
                        document = %ctx.scope.document_id,
                        block = %block,
                        %error,
                        "kernel operation failed"
                    );
                    record_failure(&ctx, &block, &error);
                    ctx.settle_status(&block);
                    Err(ExecutionError::Runtime(error))
                }
            }
        }
    };

    let ticket = ctx.queue.enqueue(token, Box::pin(task));
    let outcome = ticket.settled().await;
    ctx.running.clear_if(block, attempt_id);
    match outcome {
        // Eviction and checkpoint cancellation are normal early returns,
        // never surfaced to the caller as failures.
        Err(error) if error.is_cancelled() => {
            ctx.settle_status(block);
            Ok(())
        }
        other => other,
    }
}

/// Shared abort path: signal the block's running handle, wait for it to
/// settle, and return the block to idle. No-op when nothing is in flight.
pub(crate) async fn abort_block(ctx: &ExecutionContext, block: &BlockId) {
    if !ctx.running.is_running(block) {
        return;
    }
    ctx.set_status(block, BlockStatus::Aborting);
    ctx.running.abort(block).await;
    ctx.settle_status(block);
}

/// The document's executors, one per executable block kind.
pub struct ExecutorSet {
    ctx: Arc<ExecutionContext>,
    pub input: InputExecutor,
    pub sql: SqlExecutor,
    pub python: PythonExecutor,
    pub visualization: VisualizationExecutor,
}

impl ExecutorSet {
    pub fn new(ctx: &Arc<ExecutionContext>) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            input: InputExecutor::new(Arc::clone(ctx)),
            sql: SqlExecutor::new(Arc::clone(ctx)),
            python: PythonExecutor::new(Arc::clone(ctx)),
            visualization: VisualizationExecutor::new(Arc::clone(ctx)),
        }
    }

    pub async fn execute(
        &self,
        block: &BlockId,
        block_type: BlockType,
    ) -> Result<(), ExecutionError> {
        match block_type {
            BlockType::Input => self.input.execute(block).await,
            BlockType::Sql => self.sql.execute(block).await,
            BlockType::Python => self.python.execute(block).await,
            BlockType::Visualization => self.visualization.execute(block).await,
            BlockType::RunAll => Err(ExecutionError::InvariantViolation(
                "run-all blocks are coordinated, not executed".to_string(),
            )),
        }
    }

    pub async fn abort(&self, block: &BlockId) {
        abort_block(&self.ctx, block).await;
    }
}
