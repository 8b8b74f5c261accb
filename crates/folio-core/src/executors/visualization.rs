use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::executors::{abort_block, run_block, MISSING_SOURCE};
use folio_doc::{executed_at_stamp, BlockId, VisualizationAttributes};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Executor for visualization blocks: recomputes the chart's dataset from its
/// source block's output.
pub struct VisualizationExecutor {
    ctx: Arc<ExecutionContext>,
}

impl VisualizationExecutor {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_idle()
    }

    pub async fn execute(&self, block: &BlockId) -> Result<(), ExecutionError> {
        let attrs = VisualizationAttributes::read(self.ctx.doc.as_ref(), block);
        let Some(source_block) = attrs.source_block else {
            debug!(
                workspace = %self.ctx.scope.workspace_id,
                document = %self.ctx.scope.document_id,
                block = %block,
                "rejected chart without a source block"
            );
            self.ctx
                .doc
                .set_attribute(block, "error", json!(MISSING_SOURCE));
            return Ok(());
        };
        let spec = attrs.spec.unwrap_or_else(|| json!({}));

        run_block(
            &self.ctx,
            block,
            move |ctx, _block| {
                Box::pin(async move {
                    ctx.runtime
                        .render_visualization(&ctx.scope, &source_block, &spec)
                        .await
                })
            },
            |ctx, block, result| {
                let doc = ctx.doc.as_ref();
                doc.set_attribute(block, "dataset", result.dataset);
                doc.set_attribute(block, "pointCount", json!(result.point_count));
                doc.set_attribute(block, "error", Value::Null);
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
