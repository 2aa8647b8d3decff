use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::{ChainConfig, ChainId};
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreError, StoreResult, StorePrefixes, DB};
use chainstate_hashes::{Hash, HASH_SIZE};
use std::sync::Arc;

/// Global table of chains known to the process.
pub trait ChainsStoreReader {
    fn has(&self, chain_id: ChainId) -> StoreResult<bool>;
    fn get(&self, chain_id: ChainId) -> StoreResult<ChainConfig>;
}

#[derive(Clone)]
pub struct DbChainsStore {
    access: CachedDbAccess<ChainId, ChainConfig>,
}

impl DbChainsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, StorePrefixes::Chains.into()) }
    }

    pub fn insert(&self, writer: impl DbWriter, chain_id: ChainId, config: ChainConfig) -> StoreResult<()> {
        self.access.write(writer, chain_id, config)
    }

    pub fn delete(&self, writer: impl DbWriter, chain_id: ChainId) -> StoreResult<()> {
        self.access.delete(writer, chain_id)
    }

    /// All persisted chains, read once at node init.
    pub fn all(&self) -> StoreResult<Vec<(ChainId, ChainConfig)>> {
        let mut chains = Vec::new();
        for entry in self.access.iterator() {
            let (key, config) = entry.map_err(|err| StoreError::DataInconsistency(err.to_string()))?;
            let bytes: [u8; HASH_SIZE] = key.as_ref().try_into().expect("chain ids are hash-sized");
            chains.push((ChainId::from_bytes(bytes), config));
        }
        Ok(chains)
    }
}

impl ChainsStoreReader for DbChainsStore {
    fn has(&self, chain_id: ChainId) -> StoreResult<bool> {
        self.access.has(chain_id)
    }

    fn get(&self, chain_id: ChainId) -> StoreResult<ChainConfig> {
        self.access.read(chain_id)
    }
}

/// Global protocol-blob store: protocol hash -> raw protocol bytes.
#[derive(Clone)]
pub struct DbProtocolsStore {
    access: CachedDbAccess<Hash, Vec<u8>>,
}

impl DbProtocolsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, StorePrefixes::Protocols.into()) }
    }

    pub fn has(&self, protocol: Hash) -> StoreResult<bool> {
        self.access.has(protocol)
    }

    pub fn get(&self, protocol: Hash) -> StoreResult<Vec<u8>> {
        self.access.read(protocol)
    }

    pub fn insert(&self, writer: impl DbWriter, protocol: Hash, bytes: Vec<u8>) -> StoreResult<()> {
        self.access.write(writer, protocol, bytes)
    }
}
