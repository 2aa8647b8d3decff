use crate::BlockLevel;
use chainstate_hashes::{Hash, HeaderHasher};
use serde::{Deserialize, Serialize};

/// A block header shell. The block's identity is the hash of the encoded
/// header; genesis is the unique block whose predecessor equals its own hash.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Header {
    pub predecessor: Hash,
    pub level: BlockLevel,
    /// Totally ordered fork-choice weight (lexicographic on the encoded components).
    pub fitness: Vec<Vec<u8>>,
    pub validation_passes: u8,
    pub operations_hash: Hash,
    /// Commitment to the versioned state resulting from this block.
    pub context: Hash,
    pub timestamp: u64,
    /// Protocol-specific payload, opaque to this layer.
    pub payload: Vec<u8>,
}

impl Header {
    /// The block's content address, computed over the encoded header bytes.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("header encoding is infallible");
        let mut hasher = HeaderHasher::new();
        hasher.update(&bytes);
        hasher.finalize()
    }

    /// Whether this header is the genesis header, given the identity `hash`
    /// under which it is stored. Genesis references itself as predecessor;
    /// its identity is fixed by the genesis descriptor rather than computed,
    /// since no header can contain its own content hash.
    pub fn is_genesis_of(&self, hash: Hash) -> bool {
        self.predecessor == hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            predecessor: 7.into(),
            level: 3,
            fitness: vec![vec![0], vec![1, 2]],
            validation_passes: 4,
            operations_hash: 9.into(),
            context: 11.into(),
            timestamp: 1234,
            payload: b"payload".to_vec(),
        }
    }

    #[test]
    fn test_hash_covers_all_shell_fields() {
        let header = sample();
        let mut other = sample();
        assert_eq!(header.hash(), other.hash());
        other.timestamp += 1;
        assert_ne!(header.hash(), other.hash());
    }

    #[test]
    fn test_genesis_detection() {
        let genesis_hash: Hash = 42.into();
        let mut genesis = sample();
        genesis.level = 0;
        genesis.predecessor = genesis_hash;
        assert!(genesis.is_genesis_of(genesis_hash));
        assert!(!sample().is_genesis_of(genesis_hash));
    }
}
