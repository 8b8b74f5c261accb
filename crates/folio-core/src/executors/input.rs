use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::executors::{abort_block, is_valid_variable_name, run_block, INVALID_VARIABLE_NAME};
use folio_doc::{executed_at_stamp, BlockId, InputAttributes};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Which side of an input block a save commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveTarget {
    Variable,
    Value,
    Both,
}

/// Executor for input blocks: binds the block's variable in the document's
/// kernel, then commits the pending edit into the shared document.
pub struct InputExecutor {
    ctx: Arc<ExecutionContext>,
}

impl InputExecutor {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_idle()
    }

    /// Saves a pending variable rename: binds the new name, then commits it.
    pub async fn save_variable(&self, block: &BlockId) -> Result<(), ExecutionError> {
        self.run_save(block, SaveTarget::Variable).await
    }

    /// Saves a pending value edit: rebinds the variable to the new value.
    pub async fn save_value(&self, block: &BlockId) -> Result<(), ExecutionError> {
        self.run_save(block, SaveTarget::Value).await
    }

    /// Run-all entry point: rebinds the current name to the current value and
    /// commits both cells.
    pub async fn execute(&self, block: &BlockId) -> Result<(), ExecutionError> {
        self.run_save(block, SaveTarget::Both).await
    }

    pub async fn abort(&self, block: &BlockId) {
        abort_block(&self.ctx, block).await;
    }

    async fn run_save(&self, block: &BlockId, target: SaveTarget) -> Result<(), ExecutionError> {
        let attrs = InputAttributes::read(self.ctx.doc.as_ref(), block);

        // Validation happens before any queue interaction. A bad name is
        // inline feedback, not an execution failure.
        let name = attrs.target_variable().unwrap_or_default();
        if !is_valid_variable_name(&name) {
            debug!(
                workspace = %self.ctx.scope.workspace_id,
                document = %self.ctx.scope.document_id,
                block = %block,
                "rejected invalid variable name"
            );
            attrs
                .variable
                .with_error(INVALID_VARIABLE_NAME)
                .write(self.ctx.doc.as_ref(), block, "variable");
            return Ok(());
        }

        let value = attrs.target_value().unwrap_or(Value::Null);
        let commit_attrs = attrs.clone();
        let failure_attrs = attrs;

        run_block(
            &self.ctx,
            block,
            move |ctx, _block| {
                Box::pin(async move { ctx.runtime.bind_variable(&ctx.scope, &name, value).await })
            },
            move |ctx, block, ()| {
                let doc = ctx.doc.as_ref();
                if matches!(target, SaveTarget::Variable | SaveTarget::Both) {
                    commit_attrs.variable.committed().write(doc, block, "variable");
                }
                if matches!(target, SaveTarget::Value | SaveTarget::Both) {
                    commit_attrs.value.committed().write(doc, block, "value");
                }
                doc.set_attribute(block, "executedAt", executed_at_stamp());
            },
            move |ctx, block, error| {
                let doc = ctx.doc.as_ref();
                let cell = match target {
                    SaveTarget::Variable => &failure_attrs.variable,
                    SaveTarget::Value | SaveTarget::Both => &failure_attrs.value,
                };
                let key = match target {
                    SaveTarget::Variable => "variable",
                    SaveTarget::Value | SaveTarget::Both => "value",
                };
                cell.with_error(&error.to_string()).write(doc, block, key);
            },
        )
        .await
    }
}
