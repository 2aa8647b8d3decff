use super::chain_prefix;
use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::{ChainId, Operation};
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Per-validation-pass operation lists and per-operation metadata blobs.
pub trait OperationsStoreReader {
    fn read_operations(&self, hash: Hash) -> StoreResult<Vec<Vec<Operation>>>;
    fn read_metadata(&self, hash: Hash) -> StoreResult<Vec<Vec<Vec<u8>>>>;
}

#[derive(Clone)]
pub struct DbOperationsStore {
    operations_access: CachedDbAccess<Hash, Vec<Vec<Operation>>>,
    metadata_access: CachedDbAccess<Hash, Vec<Vec<Vec<u8>>>>,
}

impl DbOperationsStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self {
            operations_access: CachedDbAccess::new(
                Arc::clone(&db),
                DEFAULT_CACHE_SIZE,
                chain_prefix(StorePrefixes::Operations, chain_id),
            ),
            metadata_access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::OperationsMetadata, chain_id)),
        }
    }

    pub fn insert(
        &self,
        mut writer: impl DbWriter,
        hash: Hash,
        operations: Vec<Vec<Operation>>,
        metadata: Vec<Vec<Vec<u8>>>,
    ) -> StoreResult<()> {
        self.operations_access.write(&mut writer, hash, operations)?;
        self.metadata_access.write(writer, hash, metadata)
    }

    /// Strips the operation data of a block, part of pruning it.
    pub fn delete(&self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.operations_access.delete(&mut writer, hash)?;
        self.metadata_access.delete(writer, hash)
    }

    pub fn delete_all(&self, mut writer: impl DbWriter) -> StoreResult<()> {
        self.operations_access.delete_all(&mut writer)?;
        self.metadata_access.delete_all(writer)
    }
}

impl OperationsStoreReader for DbOperationsStore {
    fn read_operations(&self, hash: Hash) -> StoreResult<Vec<Vec<Operation>>> {
        self.operations_access.read(hash)
    }

    fn read_metadata(&self, hash: Hash) -> StoreResult<Vec<Vec<Vec<u8>>>> {
        self.metadata_access.read(hash)
    }
}
