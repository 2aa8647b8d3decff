//! Exponential predecessor index.
//!
//! For each stored block `B` and distance class `d in [0, PREDECESSOR_CLASSES)`,
//! entry `(B, d)` holds the hash exactly `2^d` blocks behind `B`, with the
//! defining identity `entry(B, d) = entry(entry(B, d-1), d-1)`. Entries stop
//! where they would cross genesis, so a missing entry encodes "past the
//! start of the chain". Lookups run in `O(log distance)` below
//! `2^PREDECESSOR_CLASSES` and degrade gracefully beyond.

use crate::constants::PREDECESSOR_CLASSES;
use crate::model::stores::block_records::BlockRecordsStoreReader;
use crate::model::stores::predecessors::{DbPredecessorsStore, PredecessorsStoreReader};
use chainstate_core::Header;
use chainstate_database::prelude::{DbWriter, StoreResult};
use chainstate_hashes::Hash;

/// Populates the index entries of a freshly stored block.
///
/// Assumes the block's header is already persisted and that the direct
/// predecessor's entries (if any) are populated, since the index of a block must
/// exist before any descendant references it. Genesis gets no entries.
pub fn record_ancestry(
    predecessors: &DbPredecessorsStore,
    mut writer: impl DbWriter,
    hash: Hash,
    header: &Header,
) -> StoreResult<()> {
    if header.is_genesis_of(hash) {
        return Ok(());
    }
    let mut cursor = header.predecessor;
    predecessors.set(&mut writer, hash, 0, cursor)?;
    for class in 1..PREDECESSOR_CLASSES {
        match predecessors.get(cursor, class - 1)? {
            // The predecessor's entry one class down is our entry at this class
            Some(target) => {
                predecessors.set(&mut writer, hash, class, target)?;
                cursor = target;
            }
            // Crossed genesis, higher classes do not exist
            None => break,
        }
    }
    Ok(())
}

/// Returns the hash exactly `distance` blocks behind `hash`, or `None` when
/// the distance exceeds the chain length.
///
/// Jumps greedily by the largest stored class that fits in the remaining
/// distance, capping at the highest class and recomputing the remainder
/// when the natural binary decomposition would need a larger one.
pub fn ancestor_at_distance(
    predecessors: &impl PredecessorsStoreReader,
    hash: Hash,
    mut distance: u64,
) -> StoreResult<Option<Hash>> {
    let mut current = hash;
    while distance > 0 {
        let natural_class = 63 - distance.leading_zeros() as u8;
        let class = natural_class.min(PREDECESSOR_CLASSES - 1);
        match predecessors.get(current, class)? {
            Some(target) => {
                current = target;
                distance -= 1u64 << class;
            }
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Like [`ancestor_at_distance`], but additionally confirms the ancestor is
/// still retrievable: header-known when pruned blocks are permitted, known
/// with full contents otherwise. Reclaimed ancestors read as unknown.
pub fn known_ancestor(
    predecessors: &impl PredecessorsStoreReader,
    records: &impl BlockRecordsStoreReader,
    hash: Hash,
    distance: u64,
    allow_pruned: bool,
) -> StoreResult<Option<Hash>> {
    match ancestor_at_distance(predecessors, hash, distance)? {
        None => Ok(None),
        Some(ancestor) => {
            let retrievable = if allow_pruned { records.has_header(ancestor)? } else { records.has_full(ancestor)? };
            Ok(retrievable.then_some(ancestor))
        }
    }
}
