use crate::errors::RuntimeError;
use crate::operation::Operation;
use async_trait::async_trait;
use folio_doc::BlockId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Addressing for kernel operations: every document runs against the kernel
/// of exactly one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentScope {
    pub workspace_id: String,
    pub document_id: String,
}

impl DocumentScope {
    pub fn new(workspace_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            document_id: document_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqlResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SqlResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// An in-language Python failure: the operation itself succeeded, the cell
/// raised. Distinct from `RuntimeError`, which means the kernel call failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PythonError {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PythonResult {
    pub output: Option<Value>,
    pub stdout: Vec<String>,
    pub error: Option<PythonError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualizationResult {
    pub dataset: Value,
    pub point_count: usize,
}

/// The external Python/SQL kernel, one operation per executable block kind.
///
/// Each method performs the first phase of the call and returns an
/// [`Operation`] immediately; awaiting `operation.result` is the second
/// phase. Implementations talk to the real kernel process; this crate only
/// ships [`crate::ScriptedRuntime`] for tests.
#[async_trait]
pub trait KernelRuntime: Send + Sync {
    /// Binds `name` to `value` in the document's kernel namespace.
    async fn bind_variable(
        &self,
        scope: &DocumentScope,
        name: &str,
        value: Value,
    ) -> Result<Operation<()>, RuntimeError>;

    async fn run_sql(
        &self,
        scope: &DocumentScope,
        block: &BlockId,
        query: &str,
    ) -> Result<Operation<SqlResult>, RuntimeError>;

    async fn run_python(
        &self,
        scope: &DocumentScope,
        block: &BlockId,
        source: &str,
    ) -> Result<Operation<PythonResult>, RuntimeError>;

    /// Recomputes the dataset behind a chart from its source block's output.
    async fn render_visualization(
        &self,
        scope: &DocumentScope,
        source_block: &BlockId,
        spec: &Value,
    ) -> Result<Operation<VisualizationResult>, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sql_result_counts_rows() {
        let result = SqlResult {
            columns: vec!["month".to_string(), "total".to_string()],
            rows: vec![vec![json!("jan"), json!(10)], vec![json!("feb"), json!(12)]],
        };
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn python_result_serializes_camel_case() {
        let result = PythonResult {
            output: Some(json!(3)),
            stdout: vec!["hello".to_string()],
            error: None,
        };
        let raw = serde_json::to_value(&result).expect("serialize python result");
        assert_eq!(raw["error"], Value::Null);
        assert_eq!(raw["stdout"], json!(["hello"]));
        assert_eq!(raw["output"], json!(3));
    }
}
