//! Chain-building fixtures shared across the crate's tests.

use crate::chain_store::{BlockStore, ChainStore, ValidationResult};
use crate::context::MemoryContextStore;
use crate::model::stores::block_records::BlockRecordsStoreReader;
use crate::notify::BlockNotifier;
use crate::processes::ancestry;
use chainstate_core::{BlockContents, BlockRef, ChainConfig, ChainId, GenesisDescriptor, Header, HistoryMode};
use chainstate_database::prelude::{DirectDbWriter, DB};
use chainstate_hashes::Hash;
use std::sync::Arc;

pub const TEST_TTL: u64 = 60;

/// Fixed genesis identity. A genesis header cannot contain its own content
/// hash, so the identity is assigned rather than computed.
pub fn genesis_pair() -> (Hash, Header) {
    let hash = Hash::from_u64(0xbadcab1e);
    let header = Header {
        predecessor: hash,
        level: 0,
        fitness: vec![],
        validation_passes: 0,
        operations_hash: Hash::default(),
        context: Hash::from_u64(0),
        timestamp: 0,
        payload: vec![],
    };
    (hash, header)
}

/// Appends `blocks` new blocks to `chain`, one level each. `salt` lands in
/// the payload so forks built off the same parent get distinct hashes.
pub fn extend_chain(chain: &mut Vec<(Hash, Header)>, blocks: usize, salt: u64) {
    for _ in 0..blocks {
        let (predecessor, parent) = chain.last().expect("chains start at genesis");
        let level = parent.level + 1;
        let header = Header {
            predecessor: *predecessor,
            level,
            fitness: vec![level.to_be_bytes().to_vec()],
            validation_passes: 0,
            operations_hash: Hash::default(),
            context: Hash::from_u64((salt << 32) | level),
            timestamp: level,
            payload: salt.to_le_bytes().to_vec(),
        };
        chain.push((header.hash(), header));
    }
}

/// A genesis-rooted linear chain with `length` blocks after genesis. The
/// vector index equals the block level.
pub fn linear_chain(length: usize) -> Vec<(Hash, Header)> {
    let mut chain = vec![genesis_pair()];
    extend_chain(&mut chain, length, 0);
    chain
}

pub fn block_ref(chain: &[(Hash, Header)], level: usize) -> BlockRef {
    BlockRef::new(chain[level].0, Arc::new(chain[level].1.clone()))
}

/// Writes records and ancestry entries directly, bypassing validation.
pub fn store_chain(db: &Arc<DB>, store: &mut BlockStore, chain: &[(Hash, Header)]) {
    for (hash, header) in chain {
        if store.records.has_header(*hash).unwrap() {
            continue;
        }
        let contents = BlockContents {
            header: header.clone(),
            message: None,
            max_operations_ttl: TEST_TTL,
            last_allowed_fork_level: 0,
            context: header.context,
            metadata: vec![],
        };
        store.records.insert_full(DirectDbWriter::new(db), *hash, contents).unwrap();
        ancestry::record_ancestry(&store.predecessors, DirectDbWriter::new(db), *hash, header).unwrap();
    }
}

pub fn test_config() -> ChainConfig {
    ChainConfig {
        genesis: GenesisDescriptor { time: 0, block: genesis_pair().0, protocol: Hash::from_u64(0x70) },
        faked_genesis_hash: None,
        expiration: None,
        allow_forked_chains: true,
    }
}

pub fn make_chain_store(db: Arc<DB>, context: Arc<MemoryContextStore>, mode: HistoryMode) -> Arc<ChainStore> {
    let config = test_config();
    let chain_id = ChainId::from_genesis_hash(config.genesis.block);
    ChainStore::create(db, context, BlockNotifier::new(), chain_id, config, mode).unwrap()
}

pub fn validation(header: &Header) -> ValidationResult {
    ValidationResult {
        message: Some("validated".into()),
        max_operations_ttl: TEST_TTL,
        last_allowed_fork_level: 0,
        context_hash: header.context,
        metadata: vec![],
    }
}

/// Pushes every non-genesis block through the validated store path,
/// registering each context commitment first. Returns the freshly stored
/// references (already-known blocks are skipped).
pub fn store_blocks(chain_store: &ChainStore, context: &MemoryContextStore, chain: &[(Hash, Header)]) -> Vec<BlockRef> {
    chain
        .iter()
        .filter(|(hash, header)| !header.is_genesis_of(*hash))
        .filter_map(|(_, header)| {
            context.register(header.context);
            chain_store.store_block(header.clone(), vec![], vec![], validation(header), false, false).unwrap()
        })
        .collect()
}
