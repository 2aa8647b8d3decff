use crate::errors::StateResult;
use chainstate_core::{ChainId, GenesisDescriptor};
use chainstate_hashes::{Hash, HeaderHasher};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Narrow contract over the external versioned content-addressed state
/// store ("context"). Blocks reference contexts by commitment hash; this
/// layer never looks inside a context beyond that contract.
pub trait ContextStore: Send + Sync {
    /// Commits the empty genesis state of a chain and returns its commitment.
    fn commit_genesis(&self, chain_id: ChainId, genesis: &GenesisDescriptor) -> StateResult<Hash>;

    /// Whether a commitment exists in the context store.
    fn exists(&self, commitment: Hash) -> bool;

    /// Checks a commitment out, returning an opaque handle to it.
    fn checkout(&self, commitment: Hash) -> Option<Hash>;

    /// Points the per-chain context head at a commitment. Scoped by chain
    /// id, so concurrent chains' heads do not interfere.
    fn set_head(&self, chain_id: ChainId, commitment: Hash) -> StateResult<()>;

    fn get_test_chain(&self, chain_id: ChainId) -> Option<ChainId>;

    fn set_test_chain(&self, chain_id: ChainId, test_chain: Option<ChainId>) -> StateResult<()>;
}

#[derive(Default)]
struct MemoryContextInner {
    commitments: HashSet<Hash>,
    heads: HashMap<ChainId, Hash>,
    test_chains: HashMap<ChainId, ChainId>,
}

/// In-memory context store used by tests and trusted import paths.
#[derive(Default)]
pub struct MemoryContextStore {
    inner: RwLock<MemoryContextInner>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a commitment as existing, standing in for an external
    /// validator committing real state.
    pub fn register(&self, commitment: Hash) {
        self.inner.write().commitments.insert(commitment);
    }

    pub fn head(&self, chain_id: ChainId) -> Option<Hash> {
        self.inner.read().heads.get(&chain_id).copied()
    }
}

impl ContextStore for MemoryContextStore {
    fn commit_genesis(&self, chain_id: ChainId, genesis: &GenesisDescriptor) -> StateResult<Hash> {
        let mut hasher = HeaderHasher::new();
        hasher.update(b"genesis-context").update(chain_id).update(genesis.block).update(genesis.protocol);
        let commitment = hasher.finalize();
        let mut inner = self.inner.write();
        inner.commitments.insert(commitment);
        inner.heads.insert(chain_id, commitment);
        Ok(commitment)
    }

    fn exists(&self, commitment: Hash) -> bool {
        self.inner.read().commitments.contains(&commitment)
    }

    fn checkout(&self, commitment: Hash) -> Option<Hash> {
        self.exists(commitment).then_some(commitment)
    }

    fn set_head(&self, chain_id: ChainId, commitment: Hash) -> StateResult<()> {
        self.inner.write().heads.insert(chain_id, commitment);
        Ok(())
    }

    fn get_test_chain(&self, chain_id: ChainId) -> Option<ChainId> {
        self.inner.read().test_chains.get(&chain_id).copied()
    }

    fn set_test_chain(&self, chain_id: ChainId, test_chain: Option<ChainId>) -> StateResult<()> {
        let mut inner = self.inner.write();
        match test_chain {
            Some(id) => {
                inner.test_chains.insert(chain_id, id);
            }
            None => {
                inner.test_chains.remove(&chain_id);
            }
        }
        Ok(())
    }
}
