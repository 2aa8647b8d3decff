pub mod block_records;
pub mod chain_data;
pub mod chains;
pub mod heads;
pub mod invalid_blocks;
pub mod main_branch;
pub mod operations;
pub mod predecessors;

use chainstate_core::ChainId;
use chainstate_database::prelude::{DbKey, StorePrefixes};
use chainstate_hashes::{Hash, HASH_SIZE};

/// Table prefix scoped to one chain: prefix byte followed by the chain id.
pub(crate) fn chain_prefix(prefix: StorePrefixes, chain_id: ChainId) -> Vec<u8> {
    let mut key = DbKey::prefix_only(prefix.as_ref());
    key.add_bucket(chain_id);
    key.as_ref().to_vec()
}

/// Recovers a `Hash` key from iterator key bytes.
pub(crate) fn hash_from_key(bytes: &[u8]) -> Hash {
    let array: [u8; HASH_SIZE] = bytes.try_into().expect("store keys under hash tables are exactly hash-sized");
    Hash::from_bytes(array)
}
