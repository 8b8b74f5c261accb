pub mod attributes;
pub mod block;
pub mod store;

pub use attributes::{
    AttributeCell, InputAttributes, PythonAttributes, SqlAttributes, VisualizationAttributes,
    executed_at_stamp,
};
pub use block::{BlockId, BlockType};
pub use store::{AttributeMap, AttributeObserver, DocumentStore, MemoryDocument};
