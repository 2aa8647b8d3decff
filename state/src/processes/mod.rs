pub mod ancestry;
pub mod checkpoint;
pub mod locator;
pub mod pruning;
