mod access;
mod cache;
mod db;
mod errors;
mod item;
mod key;
mod registry;
mod utils;
mod writer;

pub mod prelude {
    pub use super::access::CachedDbAccess;
    pub use super::cache::Cache;
    pub use super::db::{delete_db, ConnBuilder, DB};
    pub use super::errors::{StoreError, StoreResult, StoreResultEmptyTuple, StoreResultExtensions};
    pub use super::item::CachedDbItem;
    pub use super::key::DbKey;
    pub use super::registry::{StorePrefixes, SEPARATOR};
    pub use super::utils::DbLifetime;
    pub use super::writer::{BatchDbWriter, DbWriter, DirectDbWriter};
}
