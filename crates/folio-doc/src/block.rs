use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one block inside a shared document.
///
/// Block ids are minted by the document editing layer; this core only carries
/// them around as opaque keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Input,
    Sql,
    Python,
    Visualization,
    RunAll,
}

impl BlockType {
    /// Whether a block of this kind performs kernel work when executed.
    /// Run-all blocks only coordinate other blocks.
    pub fn is_executable(self) -> bool {
        !matches!(self, Self::RunAll)
    }
}
