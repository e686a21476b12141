//! A simple, volatile, in-memory implementation of [`Cache`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use blocktree::pluggables::Cache;

type Entries = HashMap<(Option<String>, Vec<u8>), Vec<u8>>;

/// An in-memory implementation of [`Cache`]. Clones share the same entries.
#[derive(Clone, Default)]
pub(crate) struct MemCache(Arc<Mutex<Entries>>);

impl MemCache {
    /// Create a new, empty `MemCache`.
    pub(crate) fn new() -> MemCache {
        MemCache::default()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl Cache for MemCache {
    fn read_cache(&self, scope: Option<&str>, name: &[u8]) -> Option<Vec<u8>> {
        self.0
            .lock()
            .unwrap()
            .get(&(scope.map(str::to_string), name.to_vec()))
            .cloned()
    }

    fn write_cache(&self, scope: Option<&str>, name: &[u8], value: &[u8]) {
        self.0
            .lock()
            .unwrap()
            .insert((scope.map(str::to_string), name.to_vec()), value.to_vec());
    }
}
