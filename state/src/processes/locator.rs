//! Locator construction: a compact summary of a chain's recent history used
//! for peer synchronization, built from the predecessor index with
//! exponentially growing steps.

use crate::model::stores::predecessors::PredecessorsStoreReader;
use crate::processes::ancestry::ancestor_at_distance;
use chainstate_database::prelude::StoreResult;
use chainstate_hashes::Hash;

/// Builds a locator of at most `max_size` hashes starting at `head`: dense
/// near the head, exponentially sparser towards genesis.
pub fn locator(predecessors: &impl PredecessorsStoreReader, head: Hash, max_size: usize) -> StoreResult<Vec<Hash>> {
    let mut result = Vec::with_capacity(max_size);
    if max_size == 0 {
        return Ok(result);
    }
    result.push(head);
    let mut current = head;
    let mut step = 1u64;
    while result.len() < max_size {
        match ancestor_at_distance(predecessors, current, step)? {
            Some(ancestor) => {
                result.push(ancestor);
                current = ancestor;
            }
            // Reached past genesis
            None => break,
        }
        if result.len() > 8 {
            step = step.saturating_mul(2);
        }
    }
    Ok(result)
}
