use super::{chain_prefix, hash_from_key};
use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::{BlockLevel, ChainId, InvalidBlock};
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreError, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Validation-failure records. A hash is either known invalid or known
/// valid, never both; callers enforce the disjointness.
pub trait InvalidBlocksStoreReader {
    fn has(&self, hash: Hash) -> StoreResult<bool>;
    fn get(&self, hash: Hash) -> StoreResult<InvalidBlock>;
}

#[derive(Clone)]
pub struct DbInvalidBlocksStore {
    access: CachedDbAccess<Hash, InvalidBlock>,
}

impl DbInvalidBlocksStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self { access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::InvalidBlocks, chain_id)) }
    }

    pub fn insert(&self, writer: impl DbWriter, hash: Hash, record: InvalidBlock) -> StoreResult<()> {
        self.access.write(writer, hash, record)
    }

    pub fn delete(&self, writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.access.delete(writer, hash)
    }

    pub fn delete_all(&self, writer: impl DbWriter) -> StoreResult<()> {
        self.access.delete_all(writer)
    }

    /// Hashes of every invalid block recorded at or below `level`. Used when
    /// a checkpoint advances and per-error tracking below it becomes moot.
    pub fn at_or_below(&self, level: BlockLevel) -> StoreResult<Vec<Hash>> {
        let mut hashes = Vec::new();
        for entry in self.access.iterator() {
            let (key, record) = entry.map_err(|err| StoreError::DataInconsistency(err.to_string()))?;
            if record.level <= level {
                hashes.push(hash_from_key(&key));
            }
        }
        Ok(hashes)
    }
}

impl InvalidBlocksStoreReader for DbInvalidBlocksStore {
    fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.access.has(hash)
    }

    fn get(&self, hash: Hash) -> StoreResult<InvalidBlock> {
        self.access.read(hash)
    }
}
