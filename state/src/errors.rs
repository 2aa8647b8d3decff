use chainstate_core::{BlockLevel, ChainId, HistoryMode};
use chainstate_database::prelude::StoreError;
use chainstate_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    // -- Structural: malformed input, caller bug --
    #[error("got {got} operation lists but the header declares {expected} validation passes")]
    OperationCountMismatch { expected: usize, got: usize },

    #[error("pass {pass} carries {operations} operations but {metadata} metadata entries")]
    OperationMetadataMismatch { pass: usize, operations: usize, metadata: usize },

    // -- Consistency: reported to the caller, block never committed --
    #[error("predecessor {0} of the stored block is unknown")]
    UnknownPredecessor(Hash),

    #[error("block {hash} at level {level} is not acceptable for the current checkpoint")]
    CheckpointIncompatible { hash: Hash, level: BlockLevel },

    #[error("context commitment {context} declared by block {block} does not exist in the context store")]
    UnknownContextCommitment { block: Hash, context: Hash },

    #[error("block {0} is known valid and cannot be marked invalid")]
    ValidBlockMarkedInvalid(Hash),

    #[error("chain {chain} expired at {expiration}, refusing block with timestamp {timestamp}")]
    ChainExpired { chain: ChainId, expiration: u64, timestamp: u64 },

    // -- Lifecycle --
    #[error("chain {0} is not known to the registry")]
    UnknownChain(ChainId),

    #[error("chain {0} already exists")]
    ChainAlreadyExists(ChainId),

    #[error("chain {0} does not allow forked chains")]
    ForkedChainNotAllowed(ChainId),

    #[error("discarded history cannot be rebuilt: switching from {from} to {to} is not allowed")]
    HistoryModeSwitch { from: HistoryMode, to: HistoryMode },

    // -- Fatal: caller protocol violation --
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    // -- Storage: propagated unchanged --
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StateResult<T> = std::result::Result<T, StateError>;
