use folio_doc::{BlockId, DocumentStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-block execution status, mirrored into the block's `status` attribute
/// on every transition so queue state and document state never diverge across
/// reconnecting clients. Within one run cycle the status only moves forward;
/// the terminal transition back to `idle` starts the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockStatus {
    Idle,
    Enqueued,
    Running,
    Aborting,
    Completed,
    /// Parse fallback for status strings written by newer clients.
    #[serde(other)]
    Unknown,
}

impl BlockStatus {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        match doc.attribute(block, "status") {
            None => Self::Idle,
            Some(raw) => serde_json::from_value(raw).unwrap_or(Self::Unknown),
        }
    }

    pub fn write(self, doc: &dyn DocumentStore, block: &BlockId) {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        doc.set_attribute(block, "status", raw);
    }
}

/// Aggregate status of a run-all batch, stored on the run-all block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    Idle,
    RunRequested,
    Running,
    AbortRequested,
    Aborting,
    Completed,
    /// Entered and left only by the external scheduler; manual run/abort
    /// controls are rejected while set.
    ScheduleRunning,
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    pub fn read(doc: &dyn DocumentStore, block: &BlockId) -> Self {
        match doc.attribute(block, "status") {
            None => Self::Idle,
            Some(raw) => serde_json::from_value(raw).unwrap_or(Self::Unknown),
        }
    }

    pub fn write(self, doc: &dyn DocumentStore, block: &BlockId) {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        doc.set_attribute(block, "status", raw);
    }

    /// Whether a batch cycle is in flight. `total`/`remaining` are only
    /// authoritative while this is true.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::RunRequested | Self::Running | Self::AbortRequested | Self::Aborting
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_doc::{BlockType, MemoryDocument};
    use serde_json::json;

    #[test]
    fn block_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&BlockStatus::Enqueued).expect("serialize"),
            "\"enqueued\""
        );
        assert_eq!(
            serde_json::to_string(&BatchStatus::ScheduleRunning).expect("serialize"),
            "\"schedule-running\""
        );
    }

    #[test]
    fn missing_status_reads_idle_and_unrecognized_reads_unknown() {
        let doc = MemoryDocument::new();
        let block = doc.add_block(BlockType::Python);

        assert_eq!(BlockStatus::read(&doc, &block), BlockStatus::Idle);

        doc.set_attribute(&block, "status", json!("warming-up"));
        assert_eq!(BlockStatus::read(&doc, &block), BlockStatus::Unknown);
        assert_eq!(BatchStatus::read(&doc, &block), BatchStatus::Unknown);
    }

    #[test]
    fn write_then_read_round_trips() {
        let doc = MemoryDocument::new();
        let block = doc.add_block(BlockType::RunAll);

        BatchStatus::AbortRequested.write(&doc, &block);
        assert_eq!(BatchStatus::read(&doc, &block), BatchStatus::AbortRequested);
        assert!(BatchStatus::AbortRequested.is_active());
        assert!(!BatchStatus::ScheduleRunning.is_active());
    }
}
