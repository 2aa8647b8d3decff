use super::chain_prefix;
use chainstate_core::{BlockHashSet, ChainId};
use chainstate_database::prelude::{CachedDbItem, DbWriter, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Reader API for the known-heads set: leaves of the stored block graph,
/// i.e. blocks no stored block builds on yet.
pub trait KnownHeadsStoreReader {
    fn get(&self) -> StoreResult<BlockHashSet>;
}

#[derive(Clone)]
pub struct DbKnownHeadsStore {
    access: CachedDbItem<BlockHashSet>,
}

impl DbKnownHeadsStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self { access: CachedDbItem::new(db, chain_prefix(StorePrefixes::KnownHeads, chain_id)) }
    }

    pub fn init(&mut self, writer: impl DbWriter, initial: &BlockHashSet) -> StoreResult<()> {
        self.access.write(writer, initial)
    }

    /// A newly stored block supersedes its predecessor as a head candidate.
    pub fn advance(&mut self, writer: impl DbWriter, predecessor: Hash, new_head: Hash) -> StoreResult<BlockHashSet> {
        self.access.update(writer, |mut heads| {
            heads.remove(&predecessor);
            heads.insert(new_head);
            heads
        })
    }

    pub fn remove(&mut self, writer: impl DbWriter, head: Hash) -> StoreResult<BlockHashSet> {
        self.access.update(writer, |mut heads| {
            heads.remove(&head);
            heads
        })
    }

    pub fn clear(&mut self, writer: impl DbWriter) -> StoreResult<()> {
        self.access.remove(writer)
    }
}

impl KnownHeadsStoreReader for DbKnownHeadsStore {
    fn get(&self) -> StoreResult<BlockHashSet> {
        self.access.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstate_database::create_temp_db;
    use chainstate_database::prelude::DirectDbWriter;

    #[test]
    fn test_advance_replaces_predecessor() {
        let (_lifetime, db) = create_temp_db!();
        let mut store = DbKnownHeadsStore::new(db.clone(), ChainId::from_genesis_hash(0.into()));
        store.init(DirectDbWriter::new(&db), &BlockHashSet::from_iter([1.into(), 3.into()])).unwrap();

        let heads = store.advance(DirectDbWriter::new(&db), 3.into(), 7.into()).unwrap();
        assert_eq!(heads, BlockHashSet::from_iter([1.into(), 7.into()]));

        // Advancing from an unknown predecessor still registers the new head
        let heads = store.advance(DirectDbWriter::new(&db), 99.into(), 8.into()).unwrap();
        assert_eq!(heads, BlockHashSet::from_iter([1.into(), 7.into(), 8.into()]));

        let heads = store.remove(DirectDbWriter::new(&db), 1.into()).unwrap();
        assert_eq!(heads, BlockHashSet::from_iter([7.into(), 8.into()]));
    }
}
