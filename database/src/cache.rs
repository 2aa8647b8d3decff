use indexmap::IndexMap;
use parking_lot::RwLock;
use rand::Rng;
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

struct Inner<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    // We use IndexMap and not HashMap because it makes it cheaper to remove a random element when the cache is full.
    map: IndexMap<TKey, TData, S>,
}

/// A count-bounded concurrent cache with random eviction.
#[derive(Clone)]
pub struct Cache<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    inner: Arc<RwLock<Inner<TKey, TData, S>>>,
    max_size: usize,
}

impl<TKey, TData, S> Cache<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(size: u64) -> Self {
        // Use `size + 1` for not triggering a realloc if a new element exactly overflows capacity
        Self {
            inner: Arc::new(RwLock::new(Inner { map: IndexMap::with_capacity_and_hasher(size as usize + 1, S::default()) })),
            max_size: size as usize,
        }
    }

    pub fn get(&self, key: &TKey) -> Option<TData> {
        self.inner.read().map.get(key).cloned()
    }

    pub fn contains_key(&self, key: &TKey) -> bool {
        self.inner.read().map.contains_key(key)
    }

    fn insert_impl(&self, inner: &mut Inner<TKey, TData, S>, key: TKey, data: TData) {
        if inner.map.len() == self.max_size {
            inner.map.swap_remove_index(rand::thread_rng().gen_range(0..self.max_size));
        }
        inner.map.insert(key, data);
    }

    pub fn insert(&self, key: TKey, data: TData) {
        if self.max_size == 0 {
            return;
        }
        let mut write_guard = self.inner.write();
        self.insert_impl(&mut write_guard, key, data);
    }

    pub fn insert_many(&self, iter: &mut impl Iterator<Item = (TKey, TData)>) {
        if self.max_size == 0 {
            return;
        }
        let mut write_guard = self.inner.write();
        for (key, data) in iter {
            self.insert_impl(&mut write_guard, key, data);
        }
    }

    pub fn remove(&self, key: &TKey) -> Option<TData> {
        if self.max_size == 0 {
            return None;
        }
        self.inner.write().map.swap_remove(key)
    }

    pub fn remove_many(&self, key_iter: &mut impl Iterator<Item = TKey>) {
        if self.max_size == 0 {
            return;
        }
        let mut write_guard = self.inner.write();
        for key in key_iter {
            write_guard.map.swap_remove(&key);
        }
    }

    pub fn remove_all(&self) {
        if self.max_size == 0 {
            return;
        }
        self.inner.write().map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_bounds() {
        let cache: Cache<u64, u64> = Cache::new(4);
        for i in 0..64 {
            cache.insert(i, i * 10);
        }
        assert!((0..64).filter(|i| cache.contains_key(i)).count() <= 4);
        cache.remove_all();
        assert!(!(0..64).any(|i| cache.contains_key(&i)));
    }

    #[test]
    fn test_zero_sized_cache() {
        let cache: Cache<u64, u64> = Cache::new(0);
        cache.insert(1, 1);
        assert_eq!(cache.get(&1), None);
    }
}
