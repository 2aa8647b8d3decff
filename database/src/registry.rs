/// We use `u8::MAX` which is never a valid store prefix. Also note that through
/// the [`StorePrefixes`] enum we make sure it is not used as a prefix as well
pub const SEPARATOR: u8 = u8::MAX;

/// Single source of truth for all table prefixes used by the chain-state layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorePrefixes {
    // ---- Per-chain block tables (prefix byte + chain id bucket) ----
    BlockContents = 1,
    PrunedHeaders = 2,
    Operations = 3,
    OperationsMetadata = 4,
    Predecessors = 5,
    InvalidBlocks = 6,
    KnownHeads = 7,
    MainBranch = 8,

    // ---- Per-chain scalars ----
    CurrentHead = 16,
    Checkpoint = 17,
    SavePoint = 18,
    Caboose = 19,
    HistoryMode = 20,
    ForkingTestchain = 21,
    ProtocolByLevel = 22,

    // ---- Global tables ----
    Chains = 64,
    Protocols = 65,

    // ---- Separator ----
    /// Reserved as a separator
    Separator = SEPARATOR,
}

impl From<StorePrefixes> for Vec<u8> {
    fn from(value: StorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<StorePrefixes> for u8 {
    fn from(value: StorePrefixes) -> Self {
        value as u8
    }
}

impl AsRef<[u8]> for StorePrefixes {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: enum has repr(u8)
        std::slice::from_ref(unsafe { &*(self as *const Self as *const u8) })
    }
}

impl IntoIterator for StorePrefixes {
    type Item = u8;
    type IntoIter = <[u8; 1] as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        [self as u8].into_iter()
    }
}
