//! Storage reclamation behind the checkpoint.
//!
//! Two retention policies share the walk machinery. Full mode demotes
//! everything below the save-point to pruned records and keeps the headers
//! forever. Rolling mode keeps a TTL-bounded window of pruned headers
//! behind the target and deletes everything older, so the chain has no
//! tail history below the caboose. Mutations are flushed in batches of
//! `PURGE_BATCH_SIZE` blocks, one atomic write per batch.

use crate::chain_store::{optional, BlockStore, ChainStore};
use crate::constants::PURGE_BATCH_SIZE;
use crate::errors::StateResult;
use crate::model::stores::block_records::BlockRecordsStoreReader;
use chainstate_core::BlockDescriptor;
use chainstate_database::prelude::{BatchDbWriter, DirectDbWriter, StoreError};
use log::info;
use rocksdb::WriteBatch;

fn flush_if_full(chain: &ChainStore, batch: &mut WriteBatch, pending: &mut usize) -> StateResult<()> {
    if *pending >= PURGE_BATCH_SIZE {
        chain.db.write(std::mem::take(batch)).map_err(StoreError::from)?;
        *pending = 0;
    }
    Ok(())
}

fn flush(chain: &ChainStore, batch: WriteBatch, pending: usize) -> StateResult<()> {
    if pending > 0 {
        chain.db.write(batch).map_err(StoreError::from)?;
    }
    Ok(())
}

/// Full-retention reclamation: demotes every full block strictly below
/// `target` down to the old save-point to a pruned record, then advances
/// the save-point to `target`. Must be called with the block-store cell
/// held.
pub(crate) fn purge_full_locked(chain: &ChainStore, store: &mut BlockStore, target: BlockDescriptor) -> StateResult<()> {
    let save_point = chain.read_chain_data(|data| data.save_point);
    if target.level <= save_point.level {
        return Ok(());
    }
    let target_header = store.records.read_header(target.hash)?;

    let mut batch = WriteBatch::default();
    let mut pending = 0usize;
    let mut pruned = 0u64;
    let mut cursor = target_header.predecessor;
    while let Some(header) = optional(store.records.read_header(cursor))? {
        if store.prune_block(BatchDbWriter::new(&mut batch), cursor)? {
            pruned += 1;
        }
        pending += 1;
        flush_if_full(chain, &mut batch, &mut pending)?;
        if header.level <= save_point.level || header.is_genesis_of(cursor) {
            break;
        }
        cursor = header.predecessor;
    }
    flush(chain, batch, pending)?;

    info!("full purge of chain {} pruned {pruned} blocks, save point now at level {}", chain.chain_id, target.level);
    chain.update_chain_data(|stores, data| {
        stores.set_save_point(DirectDbWriter::new(&chain.db), &target)?;
        let mut new_data = data.clone();
        new_data.save_point = target;
        Ok((Some(new_data), ()))
    })
}

/// Rolling-retention reclamation: prunes the window of
/// `min(max_operations_ttl, level)` blocks ending at `target` (headers
/// kept) and deletes every block older than the window, stopping at
/// genesis. The lowest pruned block becomes the caboose. A target at or
/// below the save-point is a no-op. Must be called with the block-store
/// cell held.
pub(crate) fn purge_rolling_locked(chain: &ChainStore, store: &mut BlockStore, target: BlockDescriptor) -> StateResult<()> {
    let save_point = chain.read_chain_data(|data| data.save_point);
    if target.level <= save_point.level {
        // Already purged to this point; a retry must not shrink the window
        return Ok(());
    }
    // The window is derived from the target's full contents. Past the guard
    // above those must still exist, so a missing record is a storage error.
    let ttl = store.records.read_full(target.hash)?.max_operations_ttl;
    let limit = ttl.min(target.level);
    let window_floor = target.level - limit;

    let mut batch = WriteBatch::default();
    let mut pending = 0usize;
    let mut cursor = target.hash;
    let mut header = store.records.read_header(target.hash)?;
    loop {
        store.prune_block(BatchDbWriter::new(&mut batch), cursor)?;
        pending += 1;
        flush_if_full(chain, &mut batch, &mut pending)?;
        if header.level <= window_floor || header.is_genesis_of(cursor) {
            break;
        }
        let predecessor = header.predecessor;
        header = store.records.read_header(predecessor)?;
        cursor = predecessor;
    }
    let caboose = BlockDescriptor { level: header.level, hash: cursor };

    // Delete the tail below the caboose. The genesis record survives so a
    // restarted node can still anchor the chain.
    let mut deleted = 0u64;
    if !header.is_genesis_of(cursor) && header.level > 0 {
        cursor = header.predecessor;
        while let Some(tail_header) = optional(store.records.read_header(cursor))? {
            if tail_header.is_genesis_of(cursor) || tail_header.level == 0 {
                break;
            }
            store.delete_block(BatchDbWriter::new(&mut batch), cursor)?;
            deleted += 1;
            pending += 1;
            flush_if_full(chain, &mut batch, &mut pending)?;
            cursor = tail_header.predecessor;
        }
    }
    flush(chain, batch, pending)?;

    info!(
        "rolling purge of chain {} deleted {deleted} blocks, caboose now at level {}",
        chain.chain_id, caboose.level
    );
    chain.update_chain_data(|stores, data| {
        stores.set_save_point(DirectDbWriter::new(&chain.db), &target)?;
        stores.set_caboose(DirectDbWriter::new(&chain.db), &caboose)?;
        let mut new_data = data.clone();
        new_data.save_point = target;
        new_data.caboose = caboose;
        Ok((Some(new_data), ()))
    })
}

#[cfg(test)]
mod tests {
    use crate::context::MemoryContextStore;
    use crate::test_helpers::{block_ref, linear_chain, make_chain_store, store_blocks, validation};
    use chainstate_core::{HistoryMode, Mempool};
    use chainstate_database::create_temp_db;
    use std::sync::Arc;

    #[test]
    fn test_purge_full_demotes_history() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Full);
        let main = linear_chain(50);
        store_blocks(&chain_store, &context, &main);
        chain_store.set_head(block_ref(&main, 50), Mempool::default()).unwrap();

        chain_store.purge_full(block_ref(&main, 30).descriptor()).unwrap();

        // Everything below the save point is a header-only record
        for (hash, _) in &main[1..30] {
            assert!(chain_store.read_header(*hash).unwrap().is_some());
            assert!(chain_store.read_full(*hash).unwrap().is_none());
            assert!(chain_store.read_operations(*hash).unwrap().is_none());
        }
        for (hash, _) in &main[30..] {
            assert!(chain_store.read_full(*hash).unwrap().is_some());
        }
        assert_eq!(chain_store.save_point(), block_ref(&main, 30).descriptor());
        // The caboose does not move in full mode
        assert_eq!(chain_store.caboose().level, 0);

        // Purging to a lower level than the save point is a no-op
        chain_store.purge_full(block_ref(&main, 20).descriptor()).unwrap();
        assert_eq!(chain_store.save_point().level, 30);
    }

    #[test]
    fn test_purge_rolling_window() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Rolling);
        let main = linear_chain(100);
        // Store with a short operation TTL so the retention window is small
        for (_, header) in &main[1..] {
            context.register(header.context);
            let mut result = validation(header);
            result.max_operations_ttl = 5;
            chain_store.store_block(header.clone(), vec![], vec![], result, false, false).unwrap();
        }
        chain_store.set_head(block_ref(&main, 100), Mempool::default()).unwrap();

        chain_store.purge_rolling(block_ref(&main, 100).descriptor()).unwrap();

        assert_eq!(chain_store.caboose().level, 95);
        assert_eq!(chain_store.caboose().hash, main[95].0);
        assert_eq!(chain_store.save_point().level, 100);
        // The TTL window keeps headers only
        for (hash, _) in &main[95..=100] {
            assert!(chain_store.read_header(*hash).unwrap().is_some());
            assert!(chain_store.read_full(*hash).unwrap().is_none());
        }
        // Below the caboose nothing is stored, except the genesis anchor
        for (hash, _) in &main[1..95] {
            assert!(!chain_store.known_block(*hash).unwrap());
        }
        assert!(chain_store.known_block(main[0].0).unwrap());
    }

    #[test]
    fn test_purge_rolling_retry_keeps_window() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Rolling);
        let main = linear_chain(100);
        for (_, header) in &main[1..] {
            context.register(header.context);
            let mut result = validation(header);
            result.max_operations_ttl = 5;
            chain_store.store_block(header.clone(), vec![], vec![], result, false, false).unwrap();
        }
        chain_store.set_head(block_ref(&main, 100), Mempool::default()).unwrap();
        chain_store.purge_rolling(block_ref(&main, 100).descriptor()).unwrap();

        // Re-running the purge against the same target must leave the
        // retained window and the caboose untouched, even though the
        // target itself is now a header-only record
        chain_store.purge_rolling(block_ref(&main, 100).descriptor()).unwrap();
        assert_eq!(chain_store.caboose().level, 95);
        assert_eq!(chain_store.caboose().hash, main[95].0);
        assert_eq!(chain_store.save_point().level, 100);
        for (hash, _) in &main[95..=100] {
            assert!(chain_store.read_header(*hash).unwrap().is_some());
        }
        assert!(chain_store.known_block(main[0].0).unwrap());
    }

    #[test]
    fn test_rolling_purge_near_genesis() {
        let (_lifetime, db) = create_temp_db!();
        let context = Arc::new(MemoryContextStore::new());
        let chain_store = make_chain_store(db, context.clone(), HistoryMode::Rolling);
        let main = linear_chain(3);
        store_blocks(&chain_store, &context, &main);
        chain_store.set_head(block_ref(&main, 3), Mempool::default()).unwrap();

        // TTL exceeds the chain length: the window is capped at genesis
        chain_store.purge_rolling(block_ref(&main, 3).descriptor()).unwrap();
        assert_eq!(chain_store.caboose().level, 0);
        for (hash, _) in &main {
            assert!(chain_store.read_header(*hash).unwrap().is_some());
        }
    }
}
