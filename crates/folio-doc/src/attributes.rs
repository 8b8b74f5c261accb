use crate::block::BlockId;
use crate::store::DocumentStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three-field cell input blocks use for both their `variable` and
/// `value` attributes: the committed value, the uncommitted edit, and the
/// last validation error shown inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeCell {
    pub value: Option<Value>,
    pub new_value: Option<Value>,
    pub error: Option<String>,
}

impl AttributeCell {
    /// Reads a cell attribute, treating missing or malformed payloads as an
    /// empty cell. Other clients can write arbitrary JSON into the shared
    /// document; a bad payload must never panic the coordinator.
    pub fn read(doc: &dyn DocumentStore, block: &BlockId, key: &str) -> Self {
        doc.attribute(block, key)
            .and_then(|raw| serde_json::from_value(raw).ok())
            .unwrap_or_default()
    }

    pub fn write(&self, doc: &dyn DocumentStore, block: &BlockId, key: &str) {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        doc.set_attribute(block, key, raw);
    }

    /// The committed shape of this cell: the pending edit promoted to the
    /// value slot, pending edit and error cleared.
    pub fn committed(&self) -> Self {
        Self {
            value: self.new_value.clone().or_else(|| self.value.clone()),
            new_value: None,
            error: None,
        }
    }

    pub fn with_error(&self, error: &str) -> Self {
        Self {
            value: self.value.clone(),
            new_value: self.new_value.clone(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputAttributes {
    pub variable: AttributeCell,
    pub value: AttributeCell,
}

impl InputAttributes {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        Self {
            variable: AttributeCell::read(doc, block, "variable"),
            value: AttributeCell::read(doc, block, "value"),
        }
    }

    /// The variable name this input binds: the pending edit when present,
    /// otherwise the committed name.
    pub fn target_variable(&self) -> Option<String> {
        let raw = self
            .variable
            .new_value
            .as_ref()
            .or(self.variable.value.as_ref())?;
        raw.as_str().map(str::to_string)
    }

    pub fn target_value(&self) -> Option<Value> {
        self.value
            .new_value
            .clone()
            .or_else(|| self.value.value.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlAttributes {
    pub query: Option<String>,
}

impl SqlAttributes {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        Self {
            query: doc
                .attribute(block, "query")
                .and_then(|raw| raw.as_str().map(str::to_string)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PythonAttributes {
    pub source: Option<String>,
}

impl PythonAttributes {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        Self {
            source: doc
                .attribute(block, "source")
                .and_then(|raw| raw.as_str().map(str::to_string)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualizationAttributes {
    /// The block whose output this chart plots.
    pub source_block: Option<BlockId>,
    /// Chart spec (axes, mark type) as opaque JSON owned by the UI.
    pub spec: Option<Value>,
}

impl VisualizationAttributes {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        Self {
            source_block: doc
                .attribute(block, "sourceBlock")
                .and_then(|raw| raw.as_str().map(BlockId::from)),
            spec: doc.attribute(block, "spec"),
        }
    }
}

/// Current time as the RFC 3339 string written into `executedAt` attributes.
pub fn executed_at_stamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}
