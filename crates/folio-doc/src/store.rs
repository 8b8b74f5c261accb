use crate::block::{BlockId, BlockType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub type AttributeMap = HashMap<String, Value>;

/// Callback invoked after an attribute write, with the written key and value.
pub type AttributeObserver = Box<dyn Fn(&BlockId, &str, &Value) + Send + Sync>;

/// The contract this core has with the shared document.
///
/// The real implementation sits on a CRDT engine that replicates every
/// attribute write to all connected clients; the coordinator treats attribute
/// writes as its only externally observable side effect and never talks to
/// the network itself.
pub trait DocumentStore: Send + Sync {
    /// Blocks in document order.
    fn blocks(&self) -> Vec<(BlockId, BlockType)>;

    /// Snapshot of one block's attributes, or `None` for an unknown block.
    fn attributes(&self, block: &BlockId) -> Option<AttributeMap>;

    fn set_attribute(&self, block: &BlockId, key: &str, value: Value);

    /// Registers an observer for writes to one block's attributes.
    fn observe(&self, block: &BlockId, observer: AttributeObserver);

    fn attribute(&self, block: &BlockId, key: &str) -> Option<Value> {
        self.attributes(block).and_then(|mut map| map.remove(key))
    }
}

/// In-process document used by tests and by embedders that do not need CRDT
/// sync. Holds blocks in insertion order and fires observers synchronously on
/// every write.
#[derive(Default)]
pub struct MemoryDocument {
    inner: Mutex<MemoryDocumentInner>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct MemoryDocumentInner {
    order: Vec<(BlockId, BlockType)>,
    attributes: HashMap<BlockId, AttributeMap>,
    observers: Vec<(BlockId, AttributeObserver)>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block and returns its freshly minted id.
    pub fn add_block(&self, block_type: BlockType) -> BlockId {
        let id = BlockId::new(format!("b{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        let mut inner = self.inner.lock().expect("document lock poisoned");
        inner.order.push((id.clone(), block_type));
        inner.attributes.insert(id.clone(), AttributeMap::new());
        id
    }

    pub fn contains(&self, block: &BlockId) -> bool {
        let inner = self.inner.lock().expect("document lock poisoned");
        inner.attributes.contains_key(block)
    }
}

impl DocumentStore for MemoryDocument {
    fn blocks(&self) -> Vec<(BlockId, BlockType)> {
        let inner = self.inner.lock().expect("document lock poisoned");
        inner.order.clone()
    }

    fn attributes(&self, block: &BlockId) -> Option<AttributeMap> {
        let inner = self.inner.lock().expect("document lock poisoned");
        inner.attributes.get(block).cloned()
    }

    fn set_attribute(&self, block: &BlockId, key: &str, value: Value) {
        let mut inner = self.inner.lock().expect("document lock poisoned");
        let Some(map) = inner.attributes.get_mut(block) else {
            return;
        };
        map.insert(key.to_string(), value.clone());

        // Observers run synchronously under the lock; they are fire-and-forget
        // notification hooks, not re-entrant document mutators.
        for (observed, observer) in &inner.observers {
            if observed == block {
                observer(block, key, &value);
            }
        }
    }

    fn observe(&self, block: &BlockId, observer: AttributeObserver) {
        let mut inner = self.inner.lock().expect("document lock poisoned");
        inner.observers.push((block.clone(), observer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn blocks_keep_document_order() {
        let doc = MemoryDocument::new();
        let a = doc.add_block(BlockType::Input);
        let b = doc.add_block(BlockType::Sql);
        let c = doc.add_block(BlockType::RunAll);

        let order: Vec<BlockId> = doc.blocks().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn set_attribute_on_unknown_block_is_ignored() {
        let doc = MemoryDocument::new();
        doc.set_attribute(&BlockId::new("ghost"), "status", json!("running"));
        assert!(doc.attributes(&BlockId::new("ghost")).is_none());
    }

    #[test]
    fn observers_see_writes_to_their_block_only() {
        let doc = MemoryDocument::new();
        let watched = doc.add_block(BlockType::Python);
        let other = doc.add_block(BlockType::Python);

        let seen = Arc::new(Mutex::new(Vec::<(String, Value)>::new()));
        {
            let seen = Arc::clone(&seen);
            doc.observe(
                &watched,
                Box::new(move |_, key, value| {
                    seen.lock()
                        .expect("lock seen")
                        .push((key.to_string(), value.clone()));
                }),
            );
        }

        doc.set_attribute(&watched, "status", json!("running"));
        doc.set_attribute(&other, "status", json!("idle"));

        let seen = seen.lock().expect("lock seen");
        assert_eq!(seen.as_slice(), &[("status".to_string(), json!("running"))]);
    }
}
