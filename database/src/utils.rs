use crate::db::DB;
use std::{path::PathBuf, sync::Weak};
use tempfile::TempDir;

/// Ties the lifetime of an (optionally temporary) DB directory to the DB
/// instances using it. Asserts on drop that no instance outlives it.
#[derive(Default)]
pub struct DbLifetime {
    weak_db_refs: Vec<Weak<DB>>,
    optional_tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: Weak<DB>) -> Self {
        Self { weak_db_refs: vec![weak_db_ref], optional_tempdir: Some(tempdir) }
    }

    /// Tracks the DB reference and makes sure all strong refs are cleaned up
    /// but does not remove the DB from disk when dropped.
    pub fn without_destroy(weak_db_ref: Weak<DB>) -> Self {
        Self { weak_db_refs: vec![weak_db_ref], optional_tempdir: None }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.optional_tempdir.as_ref().map(|dir| dir.path().to_owned())
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for weak in self.weak_db_refs.iter() {
            let mut counter: u16 = 0;
            while weak.strong_count() > 0 {
                if counter == 0 {
                    println!("waiting for db to be dropped");
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
                counter += 1;
                assert!(counter < 500, "db is expected to be dropped before its lifetime object");
            }
        }
    }
}

/// Creates a DB within a temp directory which is deleted when the
/// returned lifetime object is dropped.
#[macro_export]
macro_rules! create_temp_db {
    () => {{
        let tempdir = tempfile::tempdir().unwrap();
        let db = $crate::prelude::ConnBuilder::new(tempdir.path().to_owned()).with_files_limit(16).build().unwrap();
        ($crate::prelude::DbLifetime::new(tempdir, std::sync::Arc::downgrade(&db)), db)
    }};
}
