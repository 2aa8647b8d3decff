use super::chain_prefix;
use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::{BlockDescriptor, BlockLevel, BlockRef, ChainId, HistoryMode};
use chainstate_database::prelude::{CachedDbAccess, CachedDbItem, DbWriter, StoreError, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Big-endian level key so per-level entries iterate in level order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LevelKey([u8; 8]);

impl LevelKey {
    pub fn new(level: BlockLevel) -> Self {
        Self(level.to_be_bytes())
    }
}

impl AsRef<[u8]> for LevelKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Persisted per-chain scalars backing the chain-data snapshot. The
/// in-memory snapshot is authoritative between commits; these items keep it
/// recoverable across restarts.
#[derive(Clone)]
pub struct DbChainDataStore {
    current_head: CachedDbItem<BlockRef>,
    checkpoint: CachedDbItem<BlockRef>,
    save_point: CachedDbItem<BlockDescriptor>,
    caboose: CachedDbItem<BlockDescriptor>,
    history_mode: CachedDbItem<HistoryMode>,
    forking_testchain: CachedDbItem<Hash>,
    protocol_by_level: CachedDbAccess<LevelKey, Hash>,
}

impl DbChainDataStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self {
            current_head: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::CurrentHead, chain_id)),
            checkpoint: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::Checkpoint, chain_id)),
            save_point: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::SavePoint, chain_id)),
            caboose: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::Caboose, chain_id)),
            history_mode: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::HistoryMode, chain_id)),
            forking_testchain: CachedDbItem::new(Arc::clone(&db), chain_prefix(StorePrefixes::ForkingTestchain, chain_id)),
            protocol_by_level: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::ProtocolByLevel, chain_id)),
        }
    }

    pub fn current_head(&self) -> StoreResult<BlockRef> {
        self.current_head.read()
    }

    pub fn set_current_head(&mut self, writer: impl DbWriter, head: &BlockRef) -> StoreResult<()> {
        self.current_head.write(writer, head)
    }

    pub fn checkpoint(&self) -> StoreResult<BlockRef> {
        self.checkpoint.read()
    }

    pub fn set_checkpoint(&mut self, writer: impl DbWriter, checkpoint: &BlockRef) -> StoreResult<()> {
        self.checkpoint.write(writer, checkpoint)
    }

    pub fn save_point(&self) -> StoreResult<BlockDescriptor> {
        self.save_point.read()
    }

    pub fn set_save_point(&mut self, writer: impl DbWriter, save_point: &BlockDescriptor) -> StoreResult<()> {
        self.save_point.write(writer, save_point)
    }

    pub fn caboose(&self) -> StoreResult<BlockDescriptor> {
        self.caboose.read()
    }

    pub fn set_caboose(&mut self, writer: impl DbWriter, caboose: &BlockDescriptor) -> StoreResult<()> {
        self.caboose.write(writer, caboose)
    }

    pub fn history_mode(&self) -> StoreResult<HistoryMode> {
        self.history_mode.read()
    }

    pub fn set_history_mode(&mut self, writer: impl DbWriter, mode: HistoryMode) -> StoreResult<()> {
        self.history_mode.write(writer, &mode)
    }

    pub fn forking_testchain(&self) -> StoreResult<Option<Hash>> {
        match self.forking_testchain.read() {
            Ok(hash) => Ok(Some(hash)),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn set_forking_testchain(&mut self, writer: impl DbWriter, forking_block: Hash) -> StoreResult<()> {
        self.forking_testchain.write(writer, &forking_block)
    }

    pub fn protocol_at(&self, level: BlockLevel) -> StoreResult<Option<Hash>> {
        match self.protocol_by_level.read(LevelKey::new(level)) {
            Ok(protocol) => Ok(Some(protocol)),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn set_protocol_at(&self, writer: impl DbWriter, level: BlockLevel, protocol: Hash) -> StoreResult<()> {
        self.protocol_by_level.write(writer, LevelKey::new(level), protocol)
    }

    /// Drops every scalar and the protocol table. Only used by chain
    /// destruction.
    pub fn clear(&mut self, mut writer: impl DbWriter) -> StoreResult<()> {
        self.current_head.remove(&mut writer)?;
        self.checkpoint.remove(&mut writer)?;
        self.save_point.remove(&mut writer)?;
        self.caboose.remove(&mut writer)?;
        self.history_mode.remove(&mut writer)?;
        self.forking_testchain.remove(&mut writer)?;
        self.protocol_by_level.delete_all(writer)
    }
}
