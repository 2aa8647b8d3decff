use std::fmt::{Display, Formatter};

/// A database key composed of a table prefix (possibly extended with a
/// per-chain bucket) followed by the logical key bytes.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DbKey {
    path: Vec<u8>,
    prefix_len: usize,
}

impl DbKey {
    pub fn new(prefix: &[u8], key: impl AsRef<[u8]>) -> Self {
        Self { path: prefix.iter().chain(key.as_ref()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    /// Extends the prefix portion with a bucket segment (e.g. a chain id),
    /// so iteration bounds cover only that bucket.
    pub fn add_bucket(&mut self, bucket: impl AsRef<[u8]>) {
        debug_assert_eq!(self.prefix_len, self.path.len(), "buckets must be added before the logical key");
        self.path.extend(bucket.as_ref());
        self.prefix_len = self.path.len();
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.path))
    }
}
