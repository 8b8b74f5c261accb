use folio_core::{DocumentController, ExecutionContext, ExecutorSet, RunAllCoordinator};
use folio_doc::{AttributeCell, BlockType, DocumentStore, MemoryDocument};
use folio_runtime::{DocumentScope, ScriptedRuntime};
use serde_json::json;
use std::sync::Arc;

fn scope() -> DocumentScope {
    DocumentScope::new("ws-1", "doc-1")
}

#[tokio::test]
async fn notebook_session_saves_edits_and_runs_the_whole_document() {
    let doc = Arc::new(MemoryDocument::new());
    let runtime = Arc::new(ScriptedRuntime::new());

    let input = doc.add_block(BlockType::Input);
    AttributeCell {
        value: None,
        new_value: Some(json!("sales_df")),
        error: None,
    }
    .write(doc.as_ref(), &input, "variable");
    let sql = doc.add_block(BlockType::Sql);
    doc.set_attribute(&sql, "query", json!("select month, total from sales"));
    let python = doc.add_block(BlockType::Python);
    doc.set_attribute(&python, "source", json!("sales_df.describe()"));
    let chart = doc.add_block(BlockType::Visualization);
    doc.set_attribute(&chart, "sourceBlock", json!(sql.as_str()));
    doc.set_attribute(&chart, "spec", json!({"mark": "bar"}));
    let batch = doc.add_block(BlockType::RunAll);

    runtime.respond(
        &format!("sql:{sql}"),
        Ok(json!({
            "columns": ["month", "total"],
            "rows": [["jan", 10], ["feb", 12]],
        })),
    );
    runtime.respond(
        &format!("python:{python}"),
        Ok(json!({"output": 3, "stdout": ["ok"], "error": null})),
    );
    runtime.respond(
        &format!("viz:{sql}"),
        Ok(json!({"dataset": [[10], [12]], "pointCount": 2})),
    );

    let controller = DocumentController::new(
        scope(),
        Arc::clone(&doc) as _,
        Arc::clone(&runtime) as _,
    );

    controller
        .input()
        .save_variable(&input)
        .await
        .expect("save the pending variable rename");
    let cell = AttributeCell::read(doc.as_ref(), &input, "variable");
    assert_eq!(cell.value, Some(json!("sales_df")));
    assert_eq!(cell.new_value, None);

    controller
        .execute_block(&batch)
        .await
        .expect("run the whole document");

    assert_eq!(
        runtime.calls(),
        vec![
            "bind:sales_df".to_string(),
            "bind:sales_df".to_string(),
            format!("sql:{sql}"),
            format!("python:{python}"),
            format!("viz:{sql}"),
        ],
        "the batch admits members in document order"
    );

    assert_eq!(
        doc.attribute(&sql, "result"),
        Some(json!({"columns": ["month", "total"], "rowCount": 2}))
    );
    assert_eq!(doc.attribute(&python, "output"), Some(json!(3)));
    assert_eq!(doc.attribute(&chart, "pointCount"), Some(json!(2)));
    assert_eq!(doc.attribute(&chart, "dataset"), Some(json!([[10], [12]])));

    assert_eq!(doc.attribute(&batch, "total"), Some(json!(4)));
    assert_eq!(doc.attribute(&batch, "remaining"), Some(json!(0)));
    assert_eq!(doc.attribute(&batch, "status"), Some(json!("idle")));
    assert!(controller.is_idle());
}

#[tokio::test]
async fn abort_before_the_result_is_awaited_discards_the_run() {
    let doc = Arc::new(MemoryDocument::new());
    let runtime = Arc::new(ScriptedRuntime::new());
    let python = doc.add_block(BlockType::Python);
    doc.set_attribute(&python, "source", json!("long_running()"));
    let mut gate = runtime.hold_call(&format!("python:{python}"));

    let ctx = ExecutionContext::new(
        scope(),
        Arc::clone(&doc) as _,
        Arc::clone(&runtime) as _,
    );
    let executors = Arc::new(ExecutorSet::new(&ctx));

    let run = {
        let executors = Arc::clone(&executors);
        let python = python.clone();
        tokio::spawn(async move { executors.execute(&python, BlockType::Python).await })
    };
    gate.entered().await;

    let abort = {
        let executors = Arc::clone(&executors);
        let python = python.clone();
        tokio::spawn(async move { executors.abort(&python).await })
    };
    while ctx.running.is_running(&python) {
        tokio::task::yield_now().await;
    }
    gate.release();

    run.await
        .expect("join run")
        .expect("an aborted run settles cleanly");
    abort.await.expect("join abort");

    assert!(doc.attribute(&python, "executedAt").is_none());
    assert!(doc.attribute(&python, "output").is_none());
    assert_eq!(runtime.abort_count(&format!("python:{python}")), 1);
    assert_eq!(doc.attribute(&python, "status"), Some(json!("idle")));
    assert!(ctx.is_idle());
}

#[tokio::test]
async fn abort_after_the_result_is_awaited_loses_to_the_commit() {
    let doc = Arc::new(MemoryDocument::new());
    let runtime = Arc::new(ScriptedRuntime::new());
    let python = doc.add_block(BlockType::Python);
    doc.set_attribute(&python, "source", json!("quick()"));
    let mut gate = runtime.hold_result(&format!("python:{python}"));

    let ctx = ExecutionContext::new(
        scope(),
        Arc::clone(&doc) as _,
        Arc::clone(&runtime) as _,
    );
    let executors = Arc::new(ExecutorSet::new(&ctx));

    let run = {
        let executors = Arc::clone(&executors);
        let python = python.clone();
        tokio::spawn(async move { executors.execute(&python, BlockType::Python).await })
    };
    gate.awaited().await;

    let abort = {
        let executors = Arc::clone(&executors);
        let python = python.clone();
        tokio::spawn(async move { executors.abort(&python).await })
    };
    while ctx.running.is_running(&python) {
        tokio::task::yield_now().await;
    }
    gate.resolve(Ok(json!({"output": 7, "stdout": [], "error": null})));

    run.await.expect("join run").expect("the run commits");
    abort.await.expect("join abort");

    assert_eq!(doc.attribute(&python, "output"), Some(json!(7)));
    assert!(doc.attribute(&python, "executedAt").is_some());
    assert_eq!(runtime.abort_count(&format!("python:{python}")), 0);
}

#[tokio::test]
async fn single_block_request_queues_behind_an_active_batch() {
    let doc = Arc::new(MemoryDocument::new());
    let runtime = Arc::new(ScriptedRuntime::new());
    let first = doc.add_block(BlockType::Python);
    doc.set_attribute(&first, "source", json!("a"));
    let second = doc.add_block(BlockType::Python);
    doc.set_attribute(&second, "source", json!("b"));
    let batch = doc.add_block(BlockType::RunAll);
    let mut gate = runtime.hold_call(&format!("python:{first}"));

    let ctx = ExecutionContext::new(
        scope(),
        Arc::clone(&doc) as _,
        Arc::clone(&runtime) as _,
    );
    let executors = Arc::new(ExecutorSet::new(&ctx));
    let coordinator = Arc::new(RunAllCoordinator::new(
        Arc::clone(&ctx),
        Arc::clone(&executors),
        folio_core::ControllerConfig::default().run_all_types,
    ));

    let batch_run = {
        let coordinator = Arc::clone(&coordinator);
        let batch = batch.clone();
        tokio::spawn(async move { coordinator.run_all(&batch).await })
    };
    gate.entered().await;

    // The whole batch is already in the queue; a block added and requested
    // now lands behind it, FIFO.
    let extra = doc.add_block(BlockType::Python);
    doc.set_attribute(&extra, "source", json!("c"));
    let extra_run = {
        let executors = Arc::clone(&executors);
        let extra = extra.clone();
        tokio::spawn(async move { executors.execute(&extra, BlockType::Python).await })
    };
    while doc.attribute(&extra, "status") != Some(json!("enqueued")) {
        tokio::task::yield_now().await;
    }
    gate.release();

    batch_run
        .await
        .expect("join batch")
        .expect("batch completes");
    extra_run
        .await
        .expect("join extra")
        .expect("queued block completes");

    assert_eq!(
        runtime.calls(),
        vec![
            format!("python:{first}"),
            format!("python:{second}"),
            format!("python:{extra}"),
        ]
    );
    assert_eq!(doc.attribute(&batch, "status"), Some(json!("idle")));
    assert!(ctx.is_idle());
}
