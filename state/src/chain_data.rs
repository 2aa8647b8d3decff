use crate::model::stores::chain_data::DbChainDataStore;
use chainstate_core::{BlockDescriptor, BlockHashSet, BlockRef, ChainId, Mempool};

/// In-memory chain-data snapshot, guarded by the chain-data cell and
/// replaced wholesale through the single mutation entry point
/// [`crate::ChainStore::update_chain_data`].
///
/// Level invariant maintained by the checkpoint engine:
/// `caboose.level <= save_point.level <= checkpoint.level <= head.level`.
#[derive(Clone, Debug)]
pub struct ChainData {
    pub current_head: BlockRef,
    pub current_mempool: Mempool,
    /// Blocks within the head's operation-TTL window.
    pub live_blocks: BlockHashSet,
    /// Operations included in the live-block window.
    pub live_operations: BlockHashSet,
    pub test_chain: Option<ChainId>,
    /// Lowest level still holding full block contents.
    pub save_point: BlockDescriptor,
    /// Lowest level holding any record at all.
    pub caboose: BlockDescriptor,
    pub checkpoint: BlockRef,
}

/// The chain-data cell contents: persisted scalars plus the authoritative
/// in-memory snapshot. Kept together so the context head pointer, the
/// persisted scalars and the snapshot can never diverge.
pub struct ChainDataCell {
    pub(crate) stores: DbChainDataStore,
    pub(crate) snapshot: ChainData,
}
