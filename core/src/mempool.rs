use chainstate_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The chain's current mempool: operations fully validated against the
/// current head, plus operations still pending validation.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Mempool {
    pub known_valid: Vec<Hash>,
    pub pending: HashSet<Hash>,
}

impl Mempool {
    pub fn is_empty(&self) -> bool {
        self.known_valid.is_empty() && self.pending.is_empty()
    }
}
