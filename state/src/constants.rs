/// Number of stored distance classes in the predecessor index: entry `d`
/// points `2^d` blocks back, `d in [0, PREDECESSOR_CLASSES)`. Covers about
/// two months of one-block-per-minute history in roughly 72MB of entries.
pub const PREDECESSOR_CLASSES: u8 = 12;

/// Number of blocks demoted or deleted per atomic write batch during a
/// purge, bounding transaction size.
pub const PURGE_BATCH_SIZE: usize = 4000;

/// Default per-table cache size (entries).
pub const DEFAULT_CACHE_SIZE: u64 = 2048;

/// Error message recorded for blocks invalidated by a checkpoint update.
pub const CHECKPOINT_ERROR: &str = "branch rejected by checkpoint";
