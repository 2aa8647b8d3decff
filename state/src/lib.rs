//! Persistent chain-state layer of a blockchain node.
//!
//! Stores block records (full or pruned), maintains an exponential
//! predecessor index for logarithmic ancestor lookup, tracks per-chain
//! head/checkpoint/save-point/caboose markers, and reclaims storage behind
//! the checkpoint under the configured history mode.

pub mod chain_data;
pub mod chain_store;
pub mod constants;
pub mod context;
pub mod errors;
pub mod model;
pub mod notify;
pub mod processes;
pub mod registry;
pub mod shared;

#[cfg(test)]
pub mod test_helpers;

pub use chain_store::ChainStore;
pub use errors::{StateError, StateResult};
pub use registry::StateRegistry;
