use super::chain_prefix;
use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::ChainId;
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Membership table for the canonical branch. The cut-alternate-heads walk
/// deletes a stale branch backwards and stops at the first block marked
/// here, so prefixes shared with the canonical chain survive.
pub trait MainBranchStoreReader {
    fn contains(&self, hash: Hash) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct DbMainBranchStore {
    access: CachedDbAccess<Hash, ()>,
}

impl DbMainBranchStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self { access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::MainBranch, chain_id)) }
    }

    pub fn insert(&self, writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.access.write(writer, hash, ())
    }

    pub fn delete(&self, writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.access.delete(writer, hash)
    }

    pub fn delete_all(&self, writer: impl DbWriter) -> StoreResult<()> {
        self.access.delete_all(writer)
    }
}

impl MainBranchStoreReader for DbMainBranchStore {
    fn contains(&self, hash: Hash) -> StoreResult<bool> {
        self.access.has(hash)
    }
}
