use crate::{header::Header, BlockLevel};
use chainstate_hashes::{Hash, HeaderHasher};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Full block record: header plus everything a pruned block loses.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockContents {
    pub header: Header,
    pub message: Option<String>,
    /// Upper bound on how far back this block's operations may reference
    /// live history; also bounds the rolling-mode retention window.
    pub max_operations_ttl: u64,
    pub last_allowed_fork_level: BlockLevel,
    pub context: Hash,
    /// Opaque protocol metadata.
    pub metadata: Vec<u8>,
}

// Pruned records keep the header alone, so full contents degrade to a
// header on the fallback read path.
impl From<BlockContents> for Arc<Header> {
    fn from(contents: BlockContents) -> Self {
        Arc::new(contents.header)
    }
}

/// An operation carried by a block, opaque to this layer.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Operation(pub Vec<u8>);

impl Operation {
    pub fn hash(&self) -> Hash {
        let mut hasher = HeaderHasher::new();
        hasher.update(&self.0);
        hasher.finalize()
    }
}

/// A committed block reference handed to watchers and head accessors.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockRef {
    pub hash: Hash,
    pub header: Arc<Header>,
}

impl BlockRef {
    pub fn new(hash: Hash, header: Arc<Header>) -> Self {
        Self { hash, header }
    }

    pub fn level(&self) -> BlockLevel {
        self.header.level
    }

    pub fn descriptor(&self) -> BlockDescriptor {
        BlockDescriptor { level: self.header.level, hash: self.hash }
    }
}

/// A (level, hash) marker such as a save-point or caboose.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub level: BlockLevel,
    pub hash: Hash,
}

/// Validation-failure record for a known-invalid block.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct InvalidBlock {
    pub level: BlockLevel,
    pub errors: Vec<String>,
}
