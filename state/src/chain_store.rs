use crate::chain_data::{ChainData, ChainDataCell};
use crate::context::ContextStore;
use crate::errors::{StateError, StateResult};
use crate::model::stores::block_records::{BlockRecordsStoreReader, DbBlockRecordsStore};
use crate::model::stores::chain_data::DbChainDataStore;
use crate::model::stores::heads::{DbKnownHeadsStore, KnownHeadsStoreReader};
use crate::model::stores::invalid_blocks::{DbInvalidBlocksStore, InvalidBlocksStoreReader};
use crate::model::stores::main_branch::{DbMainBranchStore, MainBranchStoreReader};
use crate::model::stores::operations::{DbOperationsStore, OperationsStoreReader};
use crate::model::stores::predecessors::DbPredecessorsStore;
use crate::notify::BlockNotifier;
use crate::processes::{ancestry, checkpoint, locator, pruning};
use crate::shared::Shared;
use chainstate_core::{
    BlockContents, BlockDescriptor, BlockHashSet, BlockLevel, BlockRef, ChainConfig, ChainId, Header, HistoryMode, InvalidBlock,
    Mempool, Operation,
};
use chainstate_database::prelude::{BatchDbWriter, DbWriter, DirectDbWriter, StoreError, StoreResult, DB};
use chainstate_hashes::Hash;
use log::{debug, info};
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Converts an expected-absence read into an `Option`.
pub(crate) fn optional<T>(result: StoreResult<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::KeyNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// All per-chain block tables, guarded together by the block-store cell.
pub struct BlockStore {
    pub(crate) records: DbBlockRecordsStore,
    pub(crate) operations: DbOperationsStore,
    pub(crate) predecessors: DbPredecessorsStore,
    pub(crate) invalid: DbInvalidBlocksStore,
    pub(crate) heads: DbKnownHeadsStore,
    pub(crate) main_branch: DbMainBranchStore,
}

impl BlockStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self {
            records: DbBlockRecordsStore::new(Arc::clone(&db), chain_id),
            operations: DbOperationsStore::new(Arc::clone(&db), chain_id),
            predecessors: DbPredecessorsStore::new(Arc::clone(&db), chain_id),
            invalid: DbInvalidBlocksStore::new(Arc::clone(&db), chain_id),
            heads: DbKnownHeadsStore::new(Arc::clone(&db), chain_id),
            main_branch: DbMainBranchStore::new(db, chain_id),
        }
    }

    /// Whether any trace of the hash exists: a (possibly pruned) record or
    /// an invalid-block record.
    pub(crate) fn known(&self, hash: Hash) -> StoreResult<bool> {
        Ok(self.records.has_header(hash)? || self.invalid.has(hash)?)
    }

    /// Demotes a block to a pruned record: contents and operation data go,
    /// the header stays. Any invalid record is dropped alongside.
    pub(crate) fn prune_block(&mut self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<bool> {
        let pruned = self.records.prune(&mut writer, hash)?;
        self.operations.delete(&mut writer, hash)?;
        self.invalid.delete(writer, hash)?;
        Ok(pruned)
    }

    /// Removes every record of the hash. Used only below the caboose and by
    /// the cut-alternate-heads walk.
    pub(crate) fn delete_block(&mut self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.records.delete(&mut writer, hash)?;
        self.operations.delete(&mut writer, hash)?;
        self.predecessors.delete_entries(&mut writer, hash)?;
        self.invalid.delete(&mut writer, hash)?;
        self.main_branch.delete(writer, hash)
    }

    /// Drops every table of the chain. Only used by chain destruction.
    pub(crate) fn delete_all(&mut self, mut writer: impl DbWriter) -> StoreResult<()> {
        self.records.delete_all(&mut writer)?;
        self.operations.delete_all(&mut writer)?;
        self.predecessors.delete_all(&mut writer)?;
        self.invalid.delete_all(&mut writer)?;
        self.main_branch.delete_all(&mut writer)?;
        self.heads.clear(writer)
    }
}

/// External validation outcome accompanying a block being stored.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub message: Option<String>,
    pub max_operations_ttl: u64,
    pub last_allowed_fork_level: BlockLevel,
    pub context_hash: Hash,
    pub metadata: Vec<u8>,
}

/// Storage statistics between caboose and head, for operational tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainStats {
    pub head_level: BlockLevel,
    pub save_point_level: BlockLevel,
    pub caboose_level: BlockLevel,
    pub full_blocks: u64,
    pub pruned_blocks: u64,
}

/// Computes the live-block and live-operation sets of a head: the head and
/// its `ttl` ancestors, plus every operation they carry. Pruned ancestors
/// contribute their hash but no operations.
pub(crate) fn live_sets(store: &BlockStore, head: &BlockRef, ttl: u64) -> StoreResult<(BlockHashSet, BlockHashSet)> {
    let mut live_blocks = BlockHashSet::new();
    let mut live_operations = BlockHashSet::new();
    let mut cursor = head.hash;
    let mut header = Arc::clone(&head.header);
    for _ in 0..=ttl {
        live_blocks.insert(cursor);
        if let Some(passes) = optional(store.operations.read_operations(cursor))? {
            live_operations.extend(passes.iter().flatten().map(Operation::hash));
        }
        if header.is_genesis_of(cursor) {
            break;
        }
        cursor = header.predecessor;
        header = match optional(store.records.read_header(cursor))? {
            Some(header) => header,
            None => break,
        };
    }
    Ok((live_blocks, live_operations))
}

/// One chain's persistent state: block tables behind the block-store cell,
/// the chain-data snapshot behind the chain-data cell, and the commit
/// notification hub.
///
/// Lock order: the block-store cell is always acquired before the
/// chain-data cell, never the reverse.
pub struct ChainStore {
    pub(crate) chain_id: ChainId,
    pub(crate) config: ChainConfig,
    pub(crate) db: Arc<DB>,
    pub(crate) context: Arc<dyn ContextStore>,
    pub(crate) block_store: Shared<BlockStore>,
    pub(crate) chain_data: Shared<ChainDataCell>,
    pub(crate) notifier: BlockNotifier,
    pub(crate) global_notifier: BlockNotifier,
}

impl ChainStore {
    /// Bootstraps a brand-new chain: commits the empty genesis context,
    /// stores the genesis block full at level 0, and initializes
    /// save-point = caboose = (0, genesis) with the checkpoint at genesis.
    pub(crate) fn create(
        db: Arc<DB>,
        context: Arc<dyn ContextStore>,
        global_notifier: BlockNotifier,
        chain_id: ChainId,
        config: ChainConfig,
        history_mode: HistoryMode,
    ) -> StateResult<Arc<Self>> {
        let commitment = context.commit_genesis(chain_id, &config.genesis)?;
        let genesis_hash = config.genesis.block;
        let genesis_header = Header {
            predecessor: genesis_hash,
            level: 0,
            fitness: vec![],
            validation_passes: 0,
            operations_hash: Hash::default(),
            context: commitment,
            timestamp: config.genesis.time,
            payload: vec![],
        };
        let genesis_ref = BlockRef::new(genesis_hash, Arc::new(genesis_header.clone()));
        let genesis_marker = BlockDescriptor { level: 0, hash: genesis_hash };

        let mut block_store = BlockStore::new(Arc::clone(&db), chain_id);
        let mut data_stores = DbChainDataStore::new(Arc::clone(&db), chain_id);
        let mut batch = WriteBatch::default();
        let contents = BlockContents {
            header: genesis_header,
            message: None,
            max_operations_ttl: 0,
            last_allowed_fork_level: 0,
            context: commitment,
            metadata: vec![],
        };
        block_store.records.insert_full(BatchDbWriter::new(&mut batch), genesis_hash, contents)?;
        block_store.operations.insert(BatchDbWriter::new(&mut batch), genesis_hash, vec![], vec![])?;
        block_store.heads.init(BatchDbWriter::new(&mut batch), &BlockHashSet::from_iter([genesis_hash]))?;
        block_store.main_branch.insert(BatchDbWriter::new(&mut batch), genesis_hash)?;
        data_stores.set_current_head(BatchDbWriter::new(&mut batch), &genesis_ref)?;
        data_stores.set_checkpoint(BatchDbWriter::new(&mut batch), &genesis_ref)?;
        data_stores.set_save_point(BatchDbWriter::new(&mut batch), &genesis_marker)?;
        data_stores.set_caboose(BatchDbWriter::new(&mut batch), &genesis_marker)?;
        data_stores.set_history_mode(BatchDbWriter::new(&mut batch), history_mode)?;
        data_stores.set_protocol_at(BatchDbWriter::new(&mut batch), 0, config.genesis.protocol)?;
        db.write(batch).map_err(StoreError::from)?;
        context.set_head(chain_id, commitment)?;

        info!("created chain {chain_id} at genesis {genesis_hash} in {history_mode} mode");
        let snapshot = ChainData {
            current_head: genesis_ref.clone(),
            current_mempool: Mempool::default(),
            live_blocks: BlockHashSet::from_iter([genesis_hash]),
            live_operations: BlockHashSet::new(),
            test_chain: None,
            save_point: genesis_marker,
            caboose: genesis_marker,
            checkpoint: genesis_ref,
        };
        Ok(Arc::new(Self {
            chain_id,
            config,
            db,
            context,
            block_store: Shared::new(block_store),
            chain_data: Shared::new(ChainDataCell { stores: data_stores, snapshot }),
            notifier: BlockNotifier::new(),
            global_notifier,
        }))
    }

    /// Reopens a persisted chain, rebuilding the in-memory snapshot from
    /// the scalar tables and recomputing the live sets.
    pub(crate) fn load(
        db: Arc<DB>,
        context: Arc<dyn ContextStore>,
        global_notifier: BlockNotifier,
        chain_id: ChainId,
        config: ChainConfig,
    ) -> StateResult<Arc<Self>> {
        let block_store = BlockStore::new(Arc::clone(&db), chain_id);
        let data_stores = DbChainDataStore::new(Arc::clone(&db), chain_id);
        let current_head = data_stores.current_head()?;
        // A rolling-mode head may already be header-only, in which case its
        // TTL is gone and the live sets restart from the head alone. They
        // re-fill on the next head change; stored blocks stay reachable
        // through the record tables either way.
        let ttl = optional(block_store.records.read_full(current_head.hash))?.map(|c| c.max_operations_ttl).unwrap_or(0);
        let (live_blocks, live_operations) = live_sets(&block_store, &current_head, ttl)?;
        let snapshot = ChainData {
            test_chain: context.get_test_chain(chain_id),
            current_mempool: Mempool::default(),
            live_blocks,
            live_operations,
            save_point: data_stores.save_point()?,
            caboose: data_stores.caboose()?,
            checkpoint: data_stores.checkpoint()?,
            current_head,
        };
        debug!("loaded chain {chain_id} at head level {}", snapshot.current_head.level());
        Ok(Arc::new(Self {
            chain_id,
            config,
            db,
            context,
            block_store: Shared::new(block_store),
            chain_data: Shared::new(ChainDataCell { stores: data_stores, snapshot }),
            notifier: BlockNotifier::new(),
            global_notifier,
        }))
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Subscribes to this chain's future block commits.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<BlockRef> {
        self.notifier.subscribe()
    }

    // ---- Chain-data state machine ----

    /// The only sanctioned path for chain-data mutation. Runs `f` under the
    /// chain-data cell; when `f` returns a replacement snapshot, persists
    /// the new current head and forwards its context commitment to the
    /// external context store before swapping the snapshot in.
    pub fn update_chain_data<R>(
        &self,
        f: impl FnOnce(&mut DbChainDataStore, &ChainData) -> StateResult<(Option<ChainData>, R)>,
    ) -> StateResult<R> {
        self.chain_data.with(|cell| {
            let (replacement, result) = f(&mut cell.stores, &cell.snapshot)?;
            if let Some(new_snapshot) = replacement {
                cell.stores.set_current_head(DirectDbWriter::new(&self.db), &new_snapshot.current_head)?;
                self.context.set_head(self.chain_id, new_snapshot.current_head.header.context)?;
                cell.snapshot = new_snapshot;
            }
            Ok(result)
        })
    }

    /// Read-only counterpart of [`Self::update_chain_data`], taking the
    /// same cell for a consistent multi-field snapshot.
    pub fn read_chain_data<R>(&self, f: impl FnOnce(&ChainData) -> R) -> R {
        self.chain_data.with(|cell| f(&cell.snapshot))
    }

    pub fn current_head(&self) -> BlockRef {
        self.read_chain_data(|data| data.current_head.clone())
    }

    pub fn checkpoint(&self) -> BlockRef {
        self.read_chain_data(|data| data.checkpoint.clone())
    }

    pub fn save_point(&self) -> BlockDescriptor {
        self.read_chain_data(|data| data.save_point)
    }

    pub fn caboose(&self) -> BlockDescriptor {
        self.read_chain_data(|data| data.caboose)
    }

    pub fn test_chain(&self) -> Option<ChainId> {
        self.read_chain_data(|data| data.test_chain)
    }

    pub fn mempool(&self) -> Mempool {
        self.read_chain_data(|data| data.current_mempool.clone())
    }

    pub fn set_mempool(&self, mempool: Mempool) -> StateResult<()> {
        self.update_chain_data(|_, data| {
            let mut new_data = data.clone();
            new_data.current_mempool = mempool;
            Ok((Some(new_data), ()))
        })
    }

    pub fn history_mode(&self) -> StateResult<HistoryMode> {
        self.chain_data.with(|cell| cell.stores.history_mode()).map_err(StateError::from)
    }

    // ---- Block record store ----

    /// Persists a validated block: checks structure, known/invalid status,
    /// predecessor existence, checkpoint acceptability and the context
    /// commitment; then writes header+contents+operations+metadata in one
    /// atomic batch, builds the ancestry index, advances the known-heads
    /// set and notifies watchers.
    ///
    /// Returns `None` when the block is already known (valid or invalid),
    /// which makes retried stores idempotent.
    pub fn store_block(
        &self,
        header: Header,
        operations: Vec<Vec<Operation>>,
        operations_metadata: Vec<Vec<Vec<u8>>>,
        result: ValidationResult,
        forking_testchain: bool,
        trusted_context: bool,
    ) -> StateResult<Option<BlockRef>> {
        if operations.len() != header.validation_passes as usize {
            return Err(StateError::OperationCountMismatch { expected: header.validation_passes as usize, got: operations.len() });
        }
        if operations_metadata.len() != operations.len() {
            return Err(StateError::OperationCountMismatch { expected: operations.len(), got: operations_metadata.len() });
        }
        for (pass, (ops, meta)) in operations.iter().zip(operations_metadata.iter()).enumerate() {
            if ops.len() != meta.len() {
                return Err(StateError::OperationMetadataMismatch { pass, operations: ops.len(), metadata: meta.len() });
            }
        }
        if let Some(expiration) = self.config.expiration {
            if header.timestamp > expiration {
                return Err(StateError::ChainExpired { chain: self.chain_id, expiration, timestamp: header.timestamp });
            }
        }

        // Identity is the hash of the header as transmitted; a trusted
        // context rewrite below only affects the stored contents.
        let hash = header.hash();
        self.block_store.with(|store| {
            if store.known(hash)? {
                return Ok(None);
            }
            if !store.records.has_header(header.predecessor)? {
                return Err(StateError::UnknownPredecessor(header.predecessor));
            }
            // A byzantine peer may offer blocks forking below the
            // checkpoint; those must never be committed.
            let acceptable = self.read_chain_data(|data| checkpoint::acceptable(data, &header));
            if !acceptable {
                return Err(StateError::CheckpointIncompatible { hash, level: header.level });
            }
            let mut header = header;
            if trusted_context {
                // Trusted/legacy import path: adopt the validator's actual
                // commitment instead of verifying the declared one.
                header.context = result.context_hash;
            } else if !self.context.exists(header.context) {
                return Err(StateError::UnknownContextCommitment { block: hash, context: header.context });
            }

            let contents = BlockContents {
                header: header.clone(),
                message: result.message,
                max_operations_ttl: result.max_operations_ttl,
                last_allowed_fork_level: result.last_allowed_fork_level,
                context: result.context_hash,
                metadata: result.metadata,
            };
            let mut batch = WriteBatch::default();
            store.records.insert_full(BatchDbWriter::new(&mut batch), hash, contents)?;
            store.operations.insert(BatchDbWriter::new(&mut batch), hash, operations, operations_metadata)?;
            ancestry::record_ancestry(&store.predecessors, BatchDbWriter::new(&mut batch), hash, &header)?;
            if forking_testchain {
                self.chain_data.with(|cell| cell.stores.set_forking_testchain(BatchDbWriter::new(&mut batch), hash))?;
            }
            self.db.write(batch).map_err(StoreError::from)?;
            // The new block supersedes its predecessor as a head candidate
            store.heads.advance(DirectDbWriter::new(&self.db), header.predecessor, hash)?;

            debug!("stored block {hash} at level {} on chain {}", header.level, self.chain_id);
            let block_ref = BlockRef::new(hash, Arc::new(header));
            self.notifier.notify(&block_ref);
            self.global_notifier.notify(&block_ref);
            Ok(Some(block_ref))
        })
    }

    /// Records a header as invalid. Errors if the hash is known valid;
    /// returns `false` if it was already known invalid.
    pub fn store_invalid(&self, header: &Header, errors: Vec<String>) -> StateResult<bool> {
        let hash = header.hash();
        self.block_store.with(|store| {
            if store.records.has_header(hash)? {
                return Err(StateError::ValidBlockMarkedInvalid(hash));
            }
            if store.invalid.has(hash)? {
                return Ok(false);
            }
            store.invalid.insert(DirectDbWriter::new(&self.db), hash, InvalidBlock { level: header.level, errors })?;
            Ok(true)
        })
    }

    pub fn known_block(&self, hash: Hash) -> StateResult<bool> {
        self.block_store.with(|store| store.known(hash)).map_err(StateError::from)
    }

    pub fn read_header(&self, hash: Hash) -> StateResult<Option<Arc<Header>>> {
        self.block_store.with(|store| optional(store.records.read_header(hash))).map_err(StateError::from)
    }

    pub fn read_full(&self, hash: Hash) -> StateResult<Option<BlockContents>> {
        self.block_store.with(|store| optional(store.records.read_full(hash))).map_err(StateError::from)
    }

    pub fn read_operations(&self, hash: Hash) -> StateResult<Option<Vec<Vec<Operation>>>> {
        self.block_store.with(|store| optional(store.operations.read_operations(hash))).map_err(StateError::from)
    }

    pub fn invalid_block(&self, hash: Hash) -> StateResult<Option<InvalidBlock>> {
        self.block_store.with(|store| optional(store.invalid.get(hash))).map_err(StateError::from)
    }

    pub fn known_heads(&self) -> StateResult<BlockHashSet> {
        self.block_store.with(|store| store.heads.get()).map_err(StateError::from)
    }

    // ---- Head management ----

    /// Promotes a stored block to current head, replacing the mempool,
    /// recomputing the live sets and extending the main-branch markers up
    /// to the new head. Returns the previous head.
    pub fn set_head(&self, new_head: BlockRef, mempool: Mempool) -> StateResult<BlockRef> {
        self.block_store.with(|store| {
            let ttl = store.records.read_full(new_head.hash)?.max_operations_ttl;
            let (live_blocks, live_operations) = live_sets(store, &new_head, ttl)?;

            // Mark the new head's branch canonical back to the merge point
            let mut cursor = new_head.hash;
            let mut header = Arc::clone(&new_head.header);
            while !store.main_branch.contains(cursor)? {
                store.main_branch.insert(DirectDbWriter::new(&self.db), cursor)?;
                if header.is_genesis_of(cursor) {
                    break;
                }
                cursor = header.predecessor;
                match optional(store.records.read_header(cursor))? {
                    Some(next) => header = next,
                    None => break,
                }
            }

            let test_chain = self.context.get_test_chain(self.chain_id);
            self.update_chain_data(|_, data| {
                let previous = data.current_head.clone();
                let mut new_data = data.clone();
                new_data.current_head = new_head.clone();
                new_data.current_mempool = mempool;
                new_data.live_blocks = live_blocks;
                new_data.live_operations = live_operations;
                new_data.test_chain = test_chain;
                Ok((Some(new_data), previous))
            })
        })
    }

    // ---- Ancestry queries ----

    /// The hash exactly `distance` blocks behind `hash`, if the chain
    /// reaches that far back.
    pub fn ancestor(&self, hash: Hash, distance: u64) -> StateResult<Option<Hash>> {
        self.block_store.with(|store| ancestry::ancestor_at_distance(&store.predecessors, hash, distance)).map_err(StateError::from)
    }

    /// Like [`Self::ancestor`] but requires the ancestor to still be
    /// retrievable (header-only when `allow_pruned`, full otherwise).
    pub fn known_ancestor(&self, hash: Hash, distance: u64, allow_pruned: bool) -> StateResult<Option<Hash>> {
        self.block_store
            .with(|store| ancestry::known_ancestor(&store.predecessors, &store.records, hash, distance, allow_pruned))
            .map_err(StateError::from)
    }

    /// Compact history summary for peer synchronization.
    pub fn locator(&self, max_size: usize) -> StateResult<Vec<Hash>> {
        let head = self.current_head();
        self.block_store.with(|store| locator::locator(&store.predecessors, head.hash, max_size)).map_err(StateError::from)
    }

    // ---- Checkpoint & pruning engine ----

    /// Checkpoint-compatibility test for a candidate header against the
    /// current chain data.
    pub fn acceptable_block(&self, header: &Header) -> bool {
        self.read_chain_data(|data| checkpoint::acceptable(data, header))
    }

    /// Updates the checkpoint without reclaiming storage (Archive mode).
    pub fn set_checkpoint(&self, new_checkpoint: BlockRef) -> StateResult<()> {
        self.block_store.with(|store| checkpoint::set_checkpoint_locked(self, store, new_checkpoint))
    }

    /// Updates the checkpoint, then demotes full blocks behind the new
    /// save-point to pruned records (Full history mode).
    pub fn set_checkpoint_then_purge_full(&self, new_checkpoint: BlockRef) -> StateResult<()> {
        self.block_store.with(|store| {
            let target = new_checkpoint.descriptor();
            checkpoint::set_checkpoint_locked(self, store, new_checkpoint)?;
            pruning::purge_full_locked(self, store, target)
        })
    }

    /// Updates the checkpoint, then prunes the operation-TTL window behind
    /// it and deletes everything older (Rolling history mode).
    pub fn set_checkpoint_then_purge_rolling(&self, new_checkpoint: BlockRef) -> StateResult<()> {
        self.block_store.with(|store| {
            let target = new_checkpoint.descriptor();
            checkpoint::set_checkpoint_locked(self, store, new_checkpoint)?;
            pruning::purge_rolling_locked(self, store, target)
        })
    }

    /// Reclaims storage down to `target` under the Full policy without
    /// touching the checkpoint.
    pub fn purge_full(&self, target: BlockDescriptor) -> StateResult<()> {
        self.block_store.with(|store| pruning::purge_full_locked(self, store, target))
    }

    /// Reclaims storage down to `target` under the Rolling policy without
    /// touching the checkpoint.
    pub fn purge_rolling(&self, target: BlockDescriptor) -> StateResult<()> {
        self.block_store.with(|store| pruning::purge_rolling_locked(self, store, target))
    }

    /// Switches the retention policy. Transitions discarding history are
    /// applied by an immediate purge down to the current checkpoint; the
    /// reverse transitions are rejected since discarded history cannot be
    /// reconstructed.
    pub fn transition_history_mode(&self, target: HistoryMode) -> StateResult<()> {
        let current = self.history_mode()?;
        if current == target {
            return Ok(());
        }
        if !current.can_switch_to(target) {
            return Err(StateError::HistoryModeSwitch { from: current, to: target });
        }
        info!("switching chain {} from {current} to {target} history mode", self.chain_id);
        let checkpoint = self.checkpoint();
        self.block_store.with(|store| {
            match target {
                HistoryMode::Full => pruning::purge_full_locked(self, store, checkpoint.descriptor())?,
                HistoryMode::Rolling => pruning::purge_rolling_locked(self, store, checkpoint.descriptor())?,
                HistoryMode::Archive => unreachable!("only archive can switch to archive, which is a no-op"),
            }
            self.chain_data
                .with(|cell| cell.stores.set_history_mode(DirectDbWriter::new(&self.db), target))
                .map_err(StateError::from)
        })
    }

    // ---- Protocols ----

    pub fn activate_protocol(&self, level: BlockLevel, protocol: Hash) -> StateResult<()> {
        self.chain_data
            .with(|cell| cell.stores.set_protocol_at(DirectDbWriter::new(&self.db), level, protocol))
            .map_err(StateError::from)
    }

    pub fn protocol_at(&self, level: BlockLevel) -> StateResult<Option<Hash>> {
        self.chain_data.with(|cell| cell.stores.protocol_at(level)).map_err(StateError::from)
    }

    pub fn forking_testchain_block(&self) -> StateResult<Option<Hash>> {
        self.chain_data.with(|cell| cell.stores.forking_testchain()).map_err(StateError::from)
    }

    // ---- Operational tooling ----

    /// Walks the canonical chain from head to caboose counting full and
    /// pruned records.
    pub fn stats(&self) -> StateResult<ChainStats> {
        let (head, save_point, caboose) = self.read_chain_data(|data| (data.current_head.clone(), data.save_point, data.caboose));
        self.block_store.with(|store| {
            let mut full_blocks = 0;
            let mut pruned_blocks = 0;
            let mut cursor = head.hash;
            let mut header = Arc::clone(&head.header);
            loop {
                if store.records.has_full(cursor)? {
                    full_blocks += 1;
                } else if store.records.has_header(cursor)? {
                    pruned_blocks += 1;
                }
                if header.is_genesis_of(cursor) || header.level == 0 {
                    break;
                }
                cursor = header.predecessor;
                header = match optional(store.records.read_header(cursor))? {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(ChainStats {
                head_level: head.level(),
                save_point_level: save_point.level,
                caboose_level: caboose.level,
                full_blocks,
                pruned_blocks,
            })
        })
    }

    /// Removes every table of this chain. The registry calls this on
    /// explicit chain destruction.
    pub(crate) fn delete_everything(&self) -> StateResult<()> {
        self.block_store.with(|store| {
            let mut batch = WriteBatch::default();
            store.delete_all(BatchDbWriter::new(&mut batch))?;
            self.chain_data.with(|cell| cell.stores.clear(BatchDbWriter::new(&mut batch)))?;
            self.db.write(batch).map_err(StoreError::from)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryContextStore;
    use crate::test_helpers::{block_ref, extend_chain, linear_chain, make_chain_store, store_blocks, test_config, validation};
    use chainstate_database::create_temp_db;

    #[test]
    fn test_store_block_round_trip_and_idempotence() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(3);
        let stored = store_blocks(&chain_store, &context, &main);
        assert_eq!(stored.len(), 3);

        let (hash, header) = &main[2];
        assert_eq!(*chain_store.read_header(*hash).unwrap().unwrap(), *header);
        assert_eq!(chain_store.read_full(*hash).unwrap().unwrap().header, *header);
        assert_eq!(chain_store.read_operations(*hash).unwrap().unwrap(), Vec::<Vec<Operation>>::new());

        // A retried store reports "already known" and changes nothing
        let heads_before = chain_store.known_heads().unwrap();
        let retried =
            chain_store.store_block(header.clone(), vec![], vec![], validation(header), false, false).unwrap();
        assert!(retried.is_none());
        assert_eq!(chain_store.known_heads().unwrap(), heads_before);
        assert_eq!(chain_store.ancestor(*hash, 1).unwrap(), Some(main[1].0));
    }

    #[test]
    fn test_store_block_rejections() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(2);

        // Predecessor not stored yet
        let orphan = &main[2].1;
        context.register(orphan.context);
        assert!(matches!(
            chain_store.store_block(orphan.clone(), vec![], vec![], validation(orphan), false, false),
            Err(StateError::UnknownPredecessor(_))
        ));

        // Declared validation passes must match the operation lists
        let mut mismatched = main[1].1.clone();
        mismatched.validation_passes = 1;
        context.register(mismatched.context);
        assert!(matches!(
            chain_store.store_block(mismatched.clone(), vec![], vec![], validation(&mismatched), false, false),
            Err(StateError::OperationCountMismatch { .. })
        ));
        assert!(matches!(
            chain_store.store_block(
                mismatched.clone(),
                vec![vec![Operation(vec![1])]],
                vec![vec![]],
                validation(&mismatched),
                false,
                false
            ),
            Err(StateError::OperationMetadataMismatch { .. })
        ));

        // Unregistered context commitment
        let block_one = &main[1].1;
        assert!(matches!(
            chain_store.store_block(block_one.clone(), vec![], vec![], validation(block_one), false, false),
            Err(StateError::UnknownContextCommitment { .. })
        ));
    }

    #[test]
    fn test_expired_chain_refuses_blocks() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let mut config = test_config();
        config.expiration = Some(5);
        let chain_id = ChainId::from_genesis_hash(config.genesis.block);
        let chain_store =
            ChainStore::create(db, context.clone(), BlockNotifier::new(), chain_id, config, HistoryMode::Archive).unwrap();

        // Timestamps track levels, so level 6 falls past the expiration
        let main = linear_chain(6);
        store_blocks(&chain_store, &context, &main[..6]);
        let late = &main[6].1;
        context.register(late.context);
        assert!(matches!(
            chain_store.store_block(late.clone(), vec![], vec![], validation(late), false, false),
            Err(StateError::ChainExpired { expiration: 5, timestamp: 6, .. })
        ));
    }

    #[test]
    fn test_trusted_context_rewrites_stored_commitment() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(1);

        let (hash, header) = &main[1];
        let mut result = validation(header);
        result.context_hash = Hash::from_u64(0xacc);
        // The declared commitment is never registered; the trusted path
        // adopts the validator's actual commitment instead.
        let stored = chain_store.store_block(header.clone(), vec![], vec![], result, false, true).unwrap().unwrap();
        assert_eq!(stored.hash, *hash);
        assert_eq!(stored.header.context, Hash::from_u64(0xacc));
        assert_eq!(chain_store.read_full(*hash).unwrap().unwrap().header.context, Hash::from_u64(0xacc));
    }

    #[test]
    fn test_store_invalid_disjointness() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(2);
        store_blocks(&chain_store, &context, &main[..2]);

        let bad = &main[2].1;
        assert!(chain_store.store_invalid(bad, vec!["bad fitness".into()]).unwrap());
        assert!(!chain_store.store_invalid(bad, vec!["bad fitness".into()]).unwrap());
        assert_eq!(chain_store.invalid_block(bad.hash()).unwrap().unwrap().errors, vec!["bad fitness".to_string()]);

        // An invalid block is "known" and silently skipped on store
        context.register(bad.context);
        assert!(chain_store.store_block(bad.clone(), vec![], vec![], validation(bad), false, false).unwrap().is_none());

        // A valid block can never be re-tagged invalid
        let good = &main[1].1;
        assert!(matches!(chain_store.store_invalid(good, vec![]), Err(StateError::ValidBlockMarkedInvalid(_))));
    }

    #[test]
    fn test_set_head_replaces_snapshot() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(10);
        store_blocks(&chain_store, &context, &main);

        let mempool = Mempool { known_valid: vec![1.into()], pending: [2.into()].into_iter().collect() };
        let previous = chain_store.set_head(block_ref(&main, 10), mempool.clone()).unwrap();
        assert_eq!(previous.level(), 0);
        assert_eq!(chain_store.current_head().hash, main[10].0);
        assert_eq!(chain_store.mempool(), mempool);
        // The context head follows the committed head
        assert_eq!(context.head(chain_store.chain_id()), Some(main[10].1.context));

        let live = chain_store.read_chain_data(|data| data.live_blocks.clone());
        for (hash, _) in &main {
            assert!(live.contains(hash));
        }
    }

    #[test]
    fn test_set_head_marks_canonical_branch() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(8);
        store_blocks(&chain_store, &context, &main);
        let mut fork = main[..4].to_vec();
        extend_chain(&mut fork, 6, 2);
        store_blocks(&chain_store, &context, &fork[4..]);

        chain_store.set_head(block_ref(&main, 8), Mempool::default()).unwrap();
        chain_store.block_store.with(|store| {
            for (hash, _) in &main {
                assert!(store.main_branch.contains(*hash).unwrap());
            }
            for (hash, _) in &fork[4..] {
                assert!(!store.main_branch.contains(*hash).unwrap());
            }
        });

        // A reorg onto the fork extends the markers across the fork suffix
        chain_store.set_head(block_ref(&fork, 9), Mempool::default()).unwrap();
        chain_store.block_store.with(|store| {
            for (hash, _) in &fork {
                assert!(store.main_branch.contains(*hash).unwrap());
            }
        });
    }

    #[test]
    fn test_history_mode_transitions() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let main = linear_chain(5);
        store_blocks(&chain_store, &context, &main);
        chain_store.set_head(block_ref(&main, 5), Mempool::default()).unwrap();

        chain_store.transition_history_mode(HistoryMode::Full).unwrap();
        assert_eq!(chain_store.history_mode().unwrap(), HistoryMode::Full);
        // Re-applying the current mode is a no-op
        chain_store.transition_history_mode(HistoryMode::Full).unwrap();
        // Regaining discarded history is rejected
        assert!(matches!(
            chain_store.transition_history_mode(HistoryMode::Archive),
            Err(StateError::HistoryModeSwitch { .. })
        ));
        chain_store.transition_history_mode(HistoryMode::Rolling).unwrap();
        assert!(matches!(
            chain_store.transition_history_mode(HistoryMode::Full),
            Err(StateError::HistoryModeSwitch { .. })
        ));
    }

    #[test]
    fn test_subscription_delivers_commits() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Archive);
        let receiver = chain_store.subscribe();
        let main = linear_chain(3);
        store_blocks(&chain_store, &context, &main);

        let seen: Vec<_> = receiver.try_iter().map(|block| block.hash).collect();
        assert_eq!(seen, vec![main[1].0, main[2].0, main[3].0]);
    }

    #[test]
    fn test_stats_counts_full_and_pruned() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Full);
        let main = linear_chain(10);
        store_blocks(&chain_store, &context, &main);
        chain_store.set_head(block_ref(&main, 10), Mempool::default()).unwrap();
        chain_store.purge_full(block_ref(&main, 6).descriptor()).unwrap();

        let stats = chain_store.stats().unwrap();
        assert_eq!(stats.head_level, 10);
        assert_eq!(stats.save_point_level, 6);
        assert_eq!(stats.caboose_level, 0);
        assert_eq!(stats.full_blocks, 5); // levels 6..=10
        assert_eq!(stats.pruned_blocks, 6); // genesis and levels 1..=5
    }
}
