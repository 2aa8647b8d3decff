pub mod block;
pub mod chain;
pub mod header;
pub mod history;
pub mod mempool;

pub use block::{BlockContents, BlockDescriptor, BlockRef, InvalidBlock, Operation};
pub use chain::{ChainConfig, ChainId, GenesisDescriptor};
pub use header::Header;
pub use history::HistoryMode;
pub use mempool::Mempool;

use chainstate_hashes::Hash;
use std::collections::{HashMap, HashSet};

/// Block level: 0 at genesis, strictly increasing by exactly 1 along any chain.
pub type BlockLevel = u64;

pub type BlockHashSet = HashSet<Hash>;
pub type BlockHashMap<V> = HashMap<Hash, V>;
