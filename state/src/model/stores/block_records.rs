use super::chain_prefix;
use crate::constants::DEFAULT_CACHE_SIZE;
use chainstate_core::{BlockContents, ChainId, Header};
use chainstate_database::prelude::{CachedDbAccess, DbWriter, StoreError, StoreResult, StorePrefixes, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

/// Reader API for block records. Every header read tries the pruned table
/// first and falls back to the full-contents table, because a block may be
/// pruned between reads.
pub trait BlockRecordsStoreReader {
    /// Whether any record (full or pruned) exists for the hash.
    fn has_header(&self, hash: Hash) -> StoreResult<bool>;
    fn read_header(&self, hash: Hash) -> StoreResult<Arc<Header>>;
    /// Whether a full (non-pruned) record exists for the hash.
    fn has_full(&self, hash: Hash) -> StoreResult<bool>;
    fn read_full(&self, hash: Hash) -> StoreResult<BlockContents>;
}

/// A DB + cache implementation of the block record tables, with the
/// full/pruned duality. Blocks move full -> pruned -> absent, never back.
#[derive(Clone)]
pub struct DbBlockRecordsStore {
    contents_access: CachedDbAccess<Hash, BlockContents>,
    pruned_access: CachedDbAccess<Hash, Arc<Header>>,
}

impl DbBlockRecordsStore {
    pub fn new(db: Arc<DB>, chain_id: ChainId) -> Self {
        Self {
            contents_access: CachedDbAccess::new(
                Arc::clone(&db),
                DEFAULT_CACHE_SIZE,
                chain_prefix(StorePrefixes::BlockContents, chain_id),
            ),
            pruned_access: CachedDbAccess::new(db, DEFAULT_CACHE_SIZE, chain_prefix(StorePrefixes::PrunedHeaders, chain_id)),
        }
    }

    /// Persists a full record. Append-only per hash.
    pub fn insert_full(&self, writer: impl DbWriter, hash: Hash, contents: BlockContents) -> StoreResult<()> {
        if self.has_header(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.contents_access.write(writer, hash, contents)
    }

    /// Demotes a full record to a pruned one: the header moves to the pruned
    /// table and the full contents are removed. No-op for already-pruned or
    /// absent blocks.
    pub fn prune(&self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<bool> {
        let contents = match self.contents_access.read(hash) {
            Ok(contents) => contents,
            Err(StoreError::KeyNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        self.pruned_access.write(&mut writer, hash, Arc::new(contents.header))?;
        self.contents_access.delete(writer, hash)?;
        Ok(true)
    }

    /// Removes every record for the hash. Used only below the caboose.
    pub fn delete(&self, mut writer: impl DbWriter, hash: Hash) -> StoreResult<()> {
        self.contents_access.delete(&mut writer, hash)?;
        self.pruned_access.delete(writer, hash)
    }

    pub fn delete_all(&self, mut writer: impl DbWriter) -> StoreResult<()> {
        self.contents_access.delete_all(&mut writer)?;
        self.pruned_access.delete_all(writer)
    }
}

impl BlockRecordsStoreReader for DbBlockRecordsStore {
    fn has_header(&self, hash: Hash) -> StoreResult<bool> {
        self.pruned_access.has_with_fallback(self.contents_access.prefix(), hash)
    }

    fn read_header(&self, hash: Hash) -> StoreResult<Arc<Header>> {
        self.pruned_access.read_with_fallback::<BlockContents>(self.contents_access.prefix(), hash)
    }

    fn has_full(&self, hash: Hash) -> StoreResult<bool> {
        self.contents_access.has(hash)
    }

    fn read_full(&self, hash: Hash) -> StoreResult<BlockContents> {
        self.contents_access.read(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstate_database::create_temp_db;
    use chainstate_database::prelude::{DirectDbWriter, StoreResultExtensions};

    fn contents(level: u64) -> BlockContents {
        BlockContents {
            header: Header {
                predecessor: (level - 1).into(),
                level,
                fitness: vec![vec![1]],
                validation_passes: 0,
                operations_hash: 0.into(),
                context: 0.into(),
                timestamp: level,
                payload: vec![],
            },
            message: Some("validated".into()),
            max_operations_ttl: 60,
            last_allowed_fork_level: 0,
            context: 0.into(),
            metadata: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_full_pruned_absent_lifecycle() {
        let (_lifetime, db) = create_temp_db!();
        let store = DbBlockRecordsStore::new(db.clone(), ChainId::from_genesis_hash(0.into()));
        let contents = contents(5);
        let hash = contents.header.hash();

        store.insert_full(DirectDbWriter::new(&db), hash, contents.clone()).unwrap();
        assert!(matches!(
            store.insert_full(DirectDbWriter::new(&db), hash, contents.clone()),
            Err(StoreError::HashAlreadyExists(_))
        ));
        assert!(store.has_full(hash).unwrap());
        assert_eq!(*store.read_header(hash).unwrap(), contents.header);

        assert!(store.prune(DirectDbWriter::new(&db), hash).unwrap());
        assert!(store.has_header(hash).unwrap());
        assert!(!store.has_full(hash).unwrap());
        assert_eq!(*store.read_header(hash).unwrap(), contents.header);
        assert!(store.read_full(hash).unwrap_option().is_none());
        // Pruning is idempotent and a pruned block never regains full status
        assert!(!store.prune(DirectDbWriter::new(&db), hash).unwrap());

        store.delete(DirectDbWriter::new(&db), hash).unwrap();
        assert!(!store.has_header(hash).unwrap());
    }
}
