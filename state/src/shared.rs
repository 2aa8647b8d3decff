use parking_lot::Mutex;
use std::sync::Arc;

/// Mutual-exclusion cell guarding a piece of top-level mutable state.
///
/// `with` runs the closure under the guard and returns its result, giving
/// at-most-one concurrent mutator; readers wanting a consistent multi-field
/// snapshot must also go through `with`.
///
/// The lock is not reentrant: nesting two `with` calls on the same cell
/// deadlocks. Cells follow one global order: the block-store cell is
/// always acquired before the chain-data cell, never the reverse.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(Mutex::new(value)) }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}
