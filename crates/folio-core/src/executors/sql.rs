use crate::context::ExecutionContext;
use crate::errors::ExecutionError;
use crate::executors::{abort_block, run_block, EMPTY_QUERY};
use folio_doc::{executed_at_stamp, BlockId, SqlAttributes};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Executor for SQL blocks: runs the block's query in the kernel and commits
/// the result frame summary.
pub struct SqlExecutor {
    ctx: Arc<ExecutionContext>,
}

impl SqlExecutor {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_idle()
    }

    pub async fn execute(&self, block: &BlockId) -> Result<(), ExecutionError> {
        let attrs = SqlAttributes::read(self.ctx.doc.as_ref(), block);
        let query = attrs.query.unwrap_or_default();
        if query.trim().is_empty() {
            debug!(
                workspace = %self.ctx.scope.workspace_id,
                document = %self.ctx.scope.document_id,
                block = %block,
                "rejected empty query"
            );
            self.ctx
                .doc
                .set_attribute(block, "error", json!(EMPTY_QUERY));
            return Ok(());
        }

        run_block(
            &self.ctx,
            block,
            move |ctx, block| {
                Box::pin(async move { ctx.runtime.run_sql(&ctx.scope, &block, &query).await })
            },
            |ctx, block, result| {
                let doc = ctx.doc.as_ref();
                doc.set_attribute(
                    block,
                    "result",
                    json!({
                        "columns": result.columns,
                        "rowCount": result.row_count(),
                    }),
                );
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

#[cfg(test)]
mod tests {
    use super::*;
    use folio_doc::{BlockType, DocumentStore, MemoryDocument};
    use folio_runtime::{DocumentScope, RuntimeError, ScriptedRuntime};

    fn setup() -> (
        Arc<ExecutionContext>,
        Arc<MemoryDocument>,
        Arc<ScriptedRuntime>,
        BlockId,
    ) {
        let doc = Arc::new(MemoryDocument::new());
        let runtime = Arc::new(ScriptedRuntime::new());
        let ctx = ExecutionContext::new(
            DocumentScope::new("ws", "doc"),
            Arc::clone(&doc) as _,
            Arc::clone(&runtime) as _,
        );
        let block = doc.add_block(BlockType::Sql);
        (ctx, doc, runtime, block)
    }

    #[tokio::test]
    async fn empty_query_short_circuits_without_enqueueing() {
        let (ctx, doc, runtime, block) = setup();
        doc.set_attribute(&block, "query", json!("   "));
        let executor = SqlExecutor::new(ctx);

        executor.execute(&block).await.expect("execute returns ok");

        assert_eq!(doc.attribute(&block, "error"), Some(json!(EMPTY_QUERY)));
        assert!(executor.is_idle());
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn commits_result_summary_and_clears_error() {
        let (ctx, doc, runtime, block) = setup();
        doc.set_attribute(&block, "query", json!("select month, total from sales"));
        doc.set_attribute(&block, "error", json!("stale"));
        runtime.respond(
            &format!("sql:{block}"),
            Ok(json!({
                "columns": ["month", "total"],
                "rows": [["jan", 10], ["feb", 12], ["mar", 9]],
            })),
        );
        let executor = SqlExecutor::new(ctx);

        executor.execute(&block).await.expect("query succeeds");

        assert_eq!(
            doc.attribute(&block, "result"),
            Some(json!({"columns": ["month", "total"], "rowCount": 3}))
        );
        assert_eq!(doc.attribute(&block, "error"), Some(Value::Null));
        assert!(doc.attribute(&block, "executedAt").is_some());
    }

    #[tokio::test]
    async fn query_failure_lands_in_the_error_attribute() {
        let (ctx, doc, runtime, block) = setup();
        doc.set_attribute(&block, "query", json!("select broken"));
        runtime.respond(
            &format!("sql:{block}"),
            Err(RuntimeError::OperationFailed("no such column".to_string())),
        );
        let executor = SqlExecutor::new(ctx);

        let error = executor
            .execute(&block)
            .await
            .expect_err("failure propagates");
        assert!(matches!(error, ExecutionError::Runtime(_)));
        assert_eq!(
            doc.attribute(&block, "error"),
            Some(json!("kernel operation failed: no such column"))
        );
        assert_eq!(doc.attribute(&block, "result"), None, "no partial commit");
    }
}
