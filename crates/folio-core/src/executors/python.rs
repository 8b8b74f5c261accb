use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::executors::{abort_block, run_block};
use folio_doc::{executed_at_stamp, BlockId, PythonAttributes};
use serde_json::{json, Value};
use std::sync::Arc;

/// Executor for Python cells. An in-language exception is a successful
/// operation whose result carries the `ename/evalue/traceback` triple; only a
/// failed kernel call lands as a plain error string.
pub struct PythonExecutor {
    ctx: Arc<ExecutionContext>,
}

impl PythonExecutor {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_idle()
    }

    pub async fn execute(&self, block: &BlockId) -> Result<(), ExecutionError> {
        let attrs = PythonAttributes::read(self.ctx.doc.as_ref(), block);
        let source = attrs.source.unwrap_or_default();
        // An empty cell has nothing to run; not an error, no queue
        // interaction.
        if source.trim().is_empty() {
            return Ok(());
        }

        run_block(
            &self.ctx,
            block,
            move |ctx, block| {
                Box::pin(async move { ctx.runtime.run_python(&ctx.scope, &block, &source).await })
            },
            |ctx, block, result| {
                let doc = ctx.doc.as_ref();
                doc.set_attribute(block, "output", result.output.unwrap_or(Value::Null));
                doc.set_attribute(block, "stdout", json!(result.stdout));
                let error = match result.error {
                    Some(raised) => serde_json::to_value(raised).unwrap_or(Value::Null),
                    None => Value::Null,
                };
                doc.set_attribute(block, "error", error);
                doc.set_attribute(block, "executedAt", executed_at_stamp());
            },
            |ctx, block, error| {
                ctx.doc
                    .set_attribute(block, "error", json!(error.to_string()));
            },
        )
        .await
    }

    pub async fn abort(&self, block: &BlockId) {
        abort_block(&self.ctx, block).await;
    }
}
