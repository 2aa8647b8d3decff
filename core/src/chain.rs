use chainstate_hashes::{Hash, HeaderHasher};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Chain identifier, derived deterministically from the chain's genesis hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ChainId(Hash);

impl ChainId {
    pub fn from_genesis_hash(genesis: Hash) -> Self {
        let mut hasher = HeaderHasher::new();
        hasher.update(b"chain-id").update(genesis);
        ChainId(hasher.finalize())
    }

    /// Id of a test chain forked off `forking_block` of the parent chain.
    pub fn from_forking_block(forking_block: Hash) -> Self {
        let mut hasher = HeaderHasher::new();
        hasher.update(b"test-chain-id").update(forking_block);
        ChainId(hasher.finalize())
    }

    pub const fn from_bytes(bytes: [u8; chainstate_hashes::HASH_SIZE]) -> Self {
        ChainId(Hash::from_bytes(bytes))
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AsRef<[u8]> for ChainId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// Fixed genesis descriptor of a chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GenesisDescriptor {
    pub time: u64,
    pub block: Hash,
    pub protocol: Hash,
}

/// Immutable per-chain configuration, fixed at chain creation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub genesis: GenesisDescriptor,
    /// Hash used to reference genesis before protocol activation, when the
    /// real genesis header is not yet exportable.
    pub faked_genesis_hash: Option<Hash>,
    /// Timestamp past which the chain refuses new blocks (test chains).
    pub expiration: Option<u64>,
    pub allow_forked_chains: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_derivation() {
        let a = ChainId::from_genesis_hash(1.into());
        let b = ChainId::from_genesis_hash(1.into());
        let c = ChainId::from_genesis_hash(2.into());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ChainId::from_forking_block(1.into()));
    }
}
