//! Checkpoint compatibility and enforcement.
//!
//! The checkpoint is a block below which history is final: a branch must
//! pass through it to stay valid. Enforcement runs with the block-store
//! cell held throughout, so a concurrent block store cannot reference a
//! head that is being deleted.

use crate::chain_data::ChainData;
use crate::chain_store::{optional, BlockStore, ChainStore};
use crate::constants::CHECKPOINT_ERROR;
use crate::errors::{StateError, StateResult};
use crate::model::stores::block_records::BlockRecordsStoreReader;
use crate::model::stores::heads::KnownHeadsStoreReader;
use crate::model::stores::main_branch::MainBranchStoreReader;
use crate::processes::ancestry;
use chainstate_core::{BlockRef, Header, InvalidBlock};
use chainstate_database::prelude::{DirectDbWriter, StoreResult};
use chainstate_hashes::Hash;
use log::info;
use std::cmp::Ordering;

/// Checkpoint-compatibility test for a candidate header.
///
/// Above the checkpoint level any header passes (ancestor compatibility is
/// checked separately); at the checkpoint level only the checkpoint header
/// itself passes; below it, candidates pass only while the chain has not
/// yet reached the checkpoint.
pub fn acceptable(data: &ChainData, header: &Header) -> bool {
    match header.level.cmp(&data.checkpoint.level()) {
        Ordering::Greater => true,
        Ordering::Equal => *data.checkpoint.header == *header,
        Ordering::Less => data.current_head.level() < data.checkpoint.level(),
    }
}

/// Whether a stored block's branch passes through the checkpoint. Blocks
/// below the checkpoint level are trivially valid.
pub fn is_valid_for_checkpoint(store: &BlockStore, hash: Hash, header: &Header, checkpoint: &BlockRef) -> StoreResult<bool> {
    if header.level < checkpoint.level() {
        return Ok(true);
    }
    let distance = header.level - checkpoint.level();
    Ok(ancestry::ancestor_at_distance(&store.predecessors, hash, distance)? == Some(checkpoint.hash))
}

/// Deletes a stale branch backwards from `from` until it merges into the
/// canonical branch (or runs out of stored blocks).
fn cut_alternate_branch(chain: &ChainStore, store: &mut BlockStore, from: Hash) -> StateResult<()> {
    let mut cursor = from;
    loop {
        if store.main_branch.contains(cursor)? {
            break;
        }
        let header = match optional(store.records.read_header(cursor))? {
            Some(header) => header,
            None => break,
        };
        store.delete_block(DirectDbWriter::new(&chain.db), cursor)?;
        if header.is_genesis_of(cursor) {
            break;
        }
        cursor = header.predecessor;
    }
    Ok(())
}

/// Moves the checkpoint forward and enforces it across every known head.
///
/// Precondition: the current head passes through the new checkpoint; a
/// caller violating it gets a fatal invariant error, never a partial
/// update. Heads forking below the checkpoint have their blocks above it
/// stripped and tagged invalid, and their remainder cut back to the
/// canonical branch. Stale heads already below the checkpoint are cut
/// outright. Must be called with the block-store cell held.
pub(crate) fn set_checkpoint_locked(chain: &ChainStore, store: &mut BlockStore, new_checkpoint: BlockRef) -> StateResult<()> {
    let (current_checkpoint, head) = chain.read_chain_data(|data| (data.checkpoint.clone(), data.current_head.clone()));
    if new_checkpoint.level() < current_checkpoint.level() {
        return Err(StateError::InvariantViolation("checkpoint level may only advance"));
    }
    if new_checkpoint.hash == current_checkpoint.hash {
        return Ok(());
    }
    if !is_valid_for_checkpoint(store, head.hash, &head.header, &new_checkpoint)? {
        return Err(StateError::InvariantViolation("current head must pass through the new checkpoint"));
    }

    // Invalid records at or below the checkpoint are unreachable history;
    // per-error tracking for them is moot.
    for hash in store.invalid.at_or_below(new_checkpoint.level())? {
        store.invalid.delete(DirectDbWriter::new(&chain.db), hash)?;
    }

    for head_hash in store.heads.get()? {
        if head_hash == head.hash {
            continue;
        }
        let header = match optional(store.records.read_header(head_hash))? {
            Some(header) => header,
            None => {
                store.heads.remove(DirectDbWriter::new(&chain.db), head_hash)?;
                continue;
            }
        };
        if header.level < new_checkpoint.level() {
            // Stale alternate that never reached the checkpoint
            store.heads.remove(DirectDbWriter::new(&chain.db), head_hash)?;
            cut_alternate_branch(chain, store, head_hash)?;
        } else if !is_valid_for_checkpoint(store, head_hash, &header, &new_checkpoint)? {
            store.heads.remove(DirectDbWriter::new(&chain.db), head_hash)?;
            let mut cursor = head_hash;
            let mut cursor_header = header;
            loop {
                if cursor_header.level <= new_checkpoint.level() {
                    // The branch root sits beside the checkpoint; cut it
                    // back to where it merges into the canonical branch.
                    cut_alternate_branch(chain, store, cursor)?;
                    break;
                }
                store.records.prune(DirectDbWriter::new(&chain.db), cursor)?;
                store.operations.delete(DirectDbWriter::new(&chain.db), cursor)?;
                store.invalid.insert(
                    DirectDbWriter::new(&chain.db),
                    cursor,
                    InvalidBlock { level: cursor_header.level, errors: vec![CHECKPOINT_ERROR.to_string()] },
                )?;
                cursor = cursor_header.predecessor;
                cursor_header = match optional(store.records.read_header(cursor))? {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }

    info!("checkpoint of chain {} moved to {} at level {}", chain.chain_id, new_checkpoint.hash, new_checkpoint.level());
    chain.update_chain_data(|stores, data| {
        stores.set_checkpoint(DirectDbWriter::new(&chain.db), &new_checkpoint)?;
        let mut new_data = data.clone();
        new_data.checkpoint = new_checkpoint.clone();
        Ok((Some(new_data), ()))
    })
}
