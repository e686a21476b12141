//! A simple, volatile, in-memory implementation of [`Storage`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use blocktree::{pluggables::Storage, types::data_types::CryptoHash};

#[derive(Default)]
struct Blocks {
    // Insertion order, so that scans visit blocks in the order they were written.
    order: Vec<CryptoHash>,
    bytes: HashMap<CryptoHash, Vec<u8>>,
}

/// An in-memory implementation of [`Storage`]. Clones share the same blocks.
#[derive(Clone, Default)]
pub(crate) struct MemStorage(Arc<Mutex<Blocks>>);

impl MemStorage {
    /// Create a new, empty `MemStorage`.
    pub(crate) fn new() -> MemStorage {
        MemStorage::default()
    }

    /// Drop the block stored under `hash`, simulating a store that lost data.
    pub(crate) fn remove(&self, hash: &CryptoHash) {
        let mut blocks = self.0.lock().unwrap();
        blocks.order.retain(|stored| stored != hash);
        blocks.bytes.remove(hash);
    }

    /// Overwrite the bytes stored under `hash` without rehashing them.
    pub(crate) fn corrupt(&self, hash: &CryptoHash, bytes: Vec<u8>) {
        self.0.lock().unwrap().bytes.insert(*hash, bytes);
    }
}

impl Storage for MemStorage {
    fn read_storage(&self, hash: &CryptoHash) -> Option<Vec<u8>> {
        self.0.lock().unwrap().bytes.get(hash).cloned()
    }

    fn write_storage(&mut self, hash: &CryptoHash, bytes: &[u8]) -> CryptoHash {
        let mut blocks = self.0.lock().unwrap();
        if blocks.bytes.insert(*hash, bytes.to_vec()).is_none() {
            blocks.order.push(*hash);
        }
        *hash
    }

    fn read_keys(&self) -> Vec<CryptoHash> {
        self.0.lock().unwrap().order.clone()
    }
}
