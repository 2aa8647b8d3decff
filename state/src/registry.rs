//! Process-wide chain table and lifecycle management.

use crate::chain_store::{optional, ChainStore};
use crate::context::ContextStore;
use crate::errors::{StateError, StateResult};
use crate::model::stores::chains::{ChainsStoreReader, DbChainsStore, DbProtocolsStore};
use crate::notify::BlockNotifier;
use crate::shared::Shared;
use chainstate_core::{BlockRef, ChainConfig, ChainId, GenesisDescriptor, HistoryMode};
use chainstate_database::prelude::{DirectDbWriter, DB};
use chainstate_hashes::{Hash, HeaderHasher};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

/// The process-wide registry of chains, created once at node init and
/// passed as an explicit handle through every call path. Holds the global
/// chain table, the protocol-blob store and the cross-chain commit
/// notifier.
pub struct StateRegistry {
    db: Arc<DB>,
    context: Arc<dyn ContextStore>,
    chains_store: DbChainsStore,
    protocols: DbProtocolsStore,
    chains: Shared<HashMap<ChainId, Arc<ChainStore>>>,
    main_chain_id: ChainId,
    global_notifier: BlockNotifier,
}

impl StateRegistry {
    /// Opens the process state: loads every persisted chain, bootstraps the
    /// main chain on first run, and reconciles the requested history mode
    /// against each chain's persisted one. A disallowed mode switch
    /// (regaining discarded history) fails init.
    pub fn init(
        db: Arc<DB>,
        context: Arc<dyn ContextStore>,
        main_config: ChainConfig,
        history_mode: HistoryMode,
    ) -> StateResult<Arc<Self>> {
        let chains_store = DbChainsStore::new(Arc::clone(&db));
        let protocols = DbProtocolsStore::new(Arc::clone(&db));
        let global_notifier = BlockNotifier::new();
        let main_chain_id = ChainId::from_genesis_hash(main_config.genesis.block);

        let mut chains = HashMap::new();
        for (chain_id, config) in chains_store.all()? {
            let chain = ChainStore::load(Arc::clone(&db), Arc::clone(&context), global_notifier.clone(), chain_id, config)?;
            chain.transition_history_mode(history_mode)?;
            chains.insert(chain_id, chain);
        }
        if !chains.contains_key(&main_chain_id) {
            info!("bootstrapping main chain {main_chain_id}");
            chains_store.insert(DirectDbWriter::new(&db), main_chain_id, main_config.clone())?;
            let chain = ChainStore::create(
                Arc::clone(&db),
                Arc::clone(&context),
                global_notifier.clone(),
                main_chain_id,
                main_config,
                history_mode,
            )?;
            chains.insert(main_chain_id, chain);
        }

        Ok(Arc::new(Self {
            db,
            context,
            chains_store,
            protocols,
            chains: Shared::new(chains),
            main_chain_id,
            global_notifier,
        }))
    }

    pub fn main_chain_id(&self) -> ChainId {
        self.main_chain_id
    }

    pub fn main_chain(&self) -> Arc<ChainStore> {
        self.chains.with(|chains| chains[&self.main_chain_id].clone())
    }

    pub fn get_chain(&self, chain_id: ChainId) -> StateResult<Arc<ChainStore>> {
        self.chains.with(|chains| chains.get(&chain_id).cloned()).ok_or(StateError::UnknownChain(chain_id))
    }

    pub fn chains(&self) -> Vec<Arc<ChainStore>> {
        self.chains.with(|chains| chains.values().cloned().collect())
    }

    /// Creates and registers a new chain rooted at its own genesis.
    pub fn create_chain(&self, config: ChainConfig, history_mode: HistoryMode) -> StateResult<Arc<ChainStore>> {
        let chain_id = ChainId::from_genesis_hash(config.genesis.block);
        self.register_chain(chain_id, config, history_mode)
    }

    /// Forks a test chain off a block of `parent`, expiring at
    /// `expiration`. The forking block becomes the new chain's faked
    /// genesis and the parent's context is pointed at the test chain.
    pub fn fork_test_chain(&self, parent: &ChainStore, forking_block: Hash, expiration: u64) -> StateResult<Arc<ChainStore>> {
        if !parent.config().allow_forked_chains {
            return Err(StateError::ForkedChainNotAllowed(parent.chain_id()));
        }
        let header = parent.read_header(forking_block)?.ok_or(StateError::UnknownPredecessor(forking_block))?;
        let chain_id = ChainId::from_forking_block(forking_block);
        let config = ChainConfig {
            genesis: GenesisDescriptor {
                time: header.timestamp,
                block: forking_block,
                protocol: parent.config().genesis.protocol,
            },
            faked_genesis_hash: Some(forking_block),
            expiration: Some(expiration),
            allow_forked_chains: false,
        };
        let chain = self.register_chain(chain_id, config, parent.history_mode()?)?;
        self.context.set_test_chain(parent.chain_id(), Some(chain_id))?;
        Ok(chain)
    }

    fn register_chain(&self, chain_id: ChainId, config: ChainConfig, history_mode: HistoryMode) -> StateResult<Arc<ChainStore>> {
        self.chains.with(|chains| {
            if chains.contains_key(&chain_id) || self.chains_store.has(chain_id)? {
                return Err(StateError::ChainAlreadyExists(chain_id));
            }
            self.chains_store.insert(DirectDbWriter::new(&self.db), chain_id, config.clone())?;
            let chain = ChainStore::create(
                Arc::clone(&self.db),
                Arc::clone(&self.context),
                self.global_notifier.clone(),
                chain_id,
                config,
                history_mode,
            )?;
            chains.insert(chain_id, chain.clone());
            Ok(chain)
        })
    }

    /// Destroys a non-main chain: removes it from the table and deletes
    /// every persisted record it owns.
    pub fn destroy_chain(&self, chain_id: ChainId) -> StateResult<()> {
        if chain_id == self.main_chain_id {
            return Err(StateError::InvariantViolation("the main chain cannot be destroyed"));
        }
        let chain = self.chains.with(|chains| chains.remove(&chain_id)).ok_or(StateError::UnknownChain(chain_id))?;
        self.chains_store.delete(DirectDbWriter::new(&self.db), chain_id)?;
        chain.delete_everything()?;
        info!("destroyed chain {chain_id}");
        Ok(())
    }

    /// Stores a protocol blob by content hash and returns the hash.
    pub fn store_protocol(&self, bytes: Vec<u8>) -> StateResult<Hash> {
        let mut hasher = HeaderHasher::new();
        hasher.update(&bytes);
        let protocol = hasher.finalize();
        self.protocols.insert(DirectDbWriter::new(&self.db), protocol, bytes)?;
        Ok(protocol)
    }

    pub fn read_protocol(&self, protocol: Hash) -> StateResult<Option<Vec<u8>>> {
        optional(self.protocols.get(protocol)).map_err(StateError::from)
    }

    /// Subscribes to block commits across every chain.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<BlockRef> {
        self.global_notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryContextStore;
    use crate::test_helpers::{block_ref, linear_chain, store_blocks, test_config};
    use chainstate_core::Mempool;
    use chainstate_database::create_temp_db;

    fn init_registry(db: Arc<DB>, context: Arc<MemoryContextStore>, mode: HistoryMode) -> Arc<StateRegistry> {
        StateRegistry::init(db, context, test_config(), mode).unwrap()
    }

    #[test]
    fn test_init_bootstraps_and_reloads_main_chain() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let registry = init_registry(db.clone(), context.clone(), HistoryMode::Archive);
        let main = registry.main_chain();
        assert_eq!(main.current_head().level(), 0);
        assert_eq!(main.checkpoint().level(), 0);

        let chain = linear_chain(5);
        store_blocks(&main, &context, &chain);
        main.set_head(block_ref(&chain, 5), Mempool::default()).unwrap();
        drop((main, registry));

        // A second init over the same store loads the persisted chain
        let registry = init_registry(db, context, HistoryMode::Archive);
        let main = registry.main_chain();
        assert_eq!(main.current_head().hash, chain[5].0);
        assert_eq!(main.current_head().level(), 5);
    }

    #[test]
    fn test_unknown_and_duplicate_chains() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let registry = init_registry(db, context, HistoryMode::Archive);

        assert!(matches!(registry.get_chain(ChainId::from_genesis_hash(99.into())), Err(StateError::UnknownChain(_))));
        assert!(matches!(
            registry.create_chain(test_config(), HistoryMode::Archive),
            Err(StateError::ChainAlreadyExists(_))
        ));
    }

    #[test]
    fn test_fork_and_destroy_test_chain() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let registry = init_registry(db, context.clone(), HistoryMode::Archive);
        let main = registry.main_chain();
        let chain = linear_chain(5);
        store_blocks(&main, &context, &chain);
        main.set_head(block_ref(&chain, 5), Mempool::default()).unwrap();

        let forked = registry.fork_test_chain(&main, chain[3].0, 10_000).unwrap();
        assert_eq!(forked.config().expiration, Some(10_000));
        assert_eq!(registry.get_chain(forked.chain_id()).unwrap().chain_id(), forked.chain_id());
        assert_eq!(context.get_test_chain(main.chain_id()), Some(forked.chain_id()));

        // A chain that forbids forks cannot spawn a test chain
        assert!(matches!(
            registry.fork_test_chain(&forked, chain[3].0, 10_000),
            Err(StateError::ForkedChainNotAllowed(_))
        ));

        let forked_id = forked.chain_id();
        drop(forked);
        registry.destroy_chain(forked_id).unwrap();
        assert!(matches!(registry.get_chain(forked_id), Err(StateError::UnknownChain(_))));
        assert!(matches!(
            registry.destroy_chain(registry.main_chain_id()),
            Err(StateError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_history_mode_reconciliation() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let registry = init_registry(db.clone(), context.clone(), HistoryMode::Archive);
        drop(registry);

        // Archive -> Full is a permitted downgrade applied at init
        let registry = init_registry(db.clone(), context.clone(), HistoryMode::Full);
        assert_eq!(registry.main_chain().history_mode().unwrap(), HistoryMode::Full);
        drop(registry);

        // Full -> Archive would regain discarded history
        assert!(matches!(
            StateRegistry::init(db, context, test_config(), HistoryMode::Archive),
            Err(StateError::HistoryModeSwitch { .. })
        ));
    }

    #[test]
    fn test_protocol_blob_round_trip() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let registry = init_registry(db, context, HistoryMode::Archive);

        let protocol = registry.store_protocol(vec![1, 2, 3]).unwrap();
        assert_eq!(registry.read_protocol(protocol).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(registry.read_protocol(7.into()).unwrap(), None);
    }
}
