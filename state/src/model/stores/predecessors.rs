use super::chain_prefix;
use crate::constants::{DEFAULT_CACHE_SIZE, PREDECESSOR_CLASSES};
use chainstate_core::ChainId;
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreError, StoreResult, StorePrefixes, DB};
use chainstate_hashes::{Hash, HASH_SIZE};
use std::sync::Arc;

/// Key of one predecessor-index entry: block hash followed by the distance
/// class, so all classes of a block sit contiguously in the table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PredecessorKey([u8; HASH_SIZE + 1]);

impl PredecessorKey {
    pub fn new(hash: Hash, class: u8) -> Self {
        debug_assert!(class < PREDECESSOR_CLASSES);
        let mut bytes = [0u8; HASH_SIZE + 1];
        bytes[..HASH_SIZE].copy_from_slice(&hash.as_bytes());
        bytes[HASH_SIZE] = class;
        Self(bytes)
    }
}

impl AsRef<[u8]> for PredecessorKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reader API for the exponential predecessor index: entry `(block, d)`
/// holds the hash exactly `2^d` blocks behind `block`. A missing entry
/// means the distance crosses genesis.
pub trait PredecessorsStoreReader {
    fn get(&self, hash: Hash, class: u8) -> StoreResult<Option<Hash>>;
}

#[derive(Clone)]
pub struct DbPredecessorsStore {
    access: CachedDbAccess<PredecessorKey, Hash>,
}

impl DbPredecessorsStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self { access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::Predecessors, chain_id)) }
    }

    pub fn set(&self, writer: impl DbWriter, hash: Hash, class: u8, target: Hash) -> StoreResult<()> {
        self.access.write(writer, PredecessorKey::new(hash, class), target)
    }

    /// Drops every index entry of a block, part of deleting it.
    pub fn delete_entries(&self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        for class in 0..PREDECESSOR_CLASSES {
            self.access.delete(&mut writer, PredecessorKey::new(hash, class))?;
        }
        Ok(())
    }

    pub fn delete_all(&self, writer: impl DbWriter) -> StoreResult<()> {
        self.access.delete_all(writer)
    }
}

impl PredecessorsStoreReader for DbPredecessorsStore {
    fn get(&self, hash: Hash, class: u8) -> StoreResult<Option<Hash>> {
        match self.access.read(PredecessorKey::new(hash, class)) {
            Ok(target) => Ok(Some(target)),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
