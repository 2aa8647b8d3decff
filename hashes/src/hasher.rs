use crate::{Hash, HASH_SIZE};
use sha2::{Digest, Sha256};

/// Streaming hasher producing block identities from header bytes.
#[derive(Clone, Default)]
pub struct HeaderHasher(Sha256);

impl HeaderHasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.0.update(data);
        self
    }

    pub fn finalize(self) -> Hash {
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(self.0.finalize().as_slice());
        Hash::from_bytes(bytes)
    }
}
