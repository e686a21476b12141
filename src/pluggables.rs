/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable block persistence and memoization.
//!
//! The blocktree does not ship a storage or cache backend. Users provide a [`Storage`] that maps
//! content hashes to block bytes, and a [`Cache`] that the blockchain and secure layers use to
//! remember the results of traversals.
//!
//! ## Cache scopes
//!
//! Entries are namespaced by a scope. The layers use the following scopes, all of whose values are
//! [`CryptoHash`]es keyed by a block hash:
//!
//! |Scope|Name|Value|
//! |---|---|---|
//! |[`ROOT_SCOPE`]|Any block|The first block of its chain.|
//! |[`HEAD_SCOPE`]|A chain's first block|The last block of that chain, as last observed.|
//! |[`NEXT_SCOPE`]|Any block|Its successor in its chain.|
//! |[`NAME_SCOPE`]|A zone, identity, or collection|Its plaintext `name` option (UTF-8 bytes).|
//! |[`ROOT_ZONE_SCOPE`], [`SYSTEM_ROOT_SCOPE`]|[`GLOBAL_NAME`]|The root zone, or the system root block.|
//!
//! A cache must be safe to drop at any time: every entry can be recomputed from storage alone. A
//! head entry may be stale, since the chain may have grown after it was written, so readers only
//! use it as a starting point.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::CryptoHash;

pub const ROOT_SCOPE: &str = "root";
pub const HEAD_SCOPE: &str = "head";
pub const NEXT_SCOPE: &str = "next";
pub const NAME_SCOPE: &str = "name";
pub const ROOT_ZONE_SCOPE: &str = "rootZone";
pub const SYSTEM_ROOT_SCOPE: &str = "systemRoot";

/// Name of the entries that exist once per store.
pub const GLOBAL_NAME: &[u8] = b"global";

/// A content-addressed key-value store holding the bytes of every block.
pub trait Storage: Clone + Send + 'static {
    fn read_storage(&self, hash: &CryptoHash) -> Option<Vec<u8>>;

    /// Store `bytes` under `hash`, which the caller computed as their content hash. Returns `hash`.
    fn write_storage(&mut self, hash: &CryptoHash, bytes: &[u8]) -> CryptoHash;

    /// Hashes of every stored block, in a stable order.
    fn read_keys(&self) -> Vec<CryptoHash>;

    fn count_in_storage(&self) -> u64 {
        self.read_keys().len() as u64
    }

    /// Apply `f` to every stored block, in [`read_keys`](Storage::read_keys) order.
    fn map_in_storage<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&CryptoHash, &[u8]) -> T,
    {
        self.read_keys()
            .iter()
            .filter_map(|hash| self.read_storage(hash).map(|bytes| f(hash, &bytes)))
            .collect()
    }

    /// The first stored block, in [`read_keys`](Storage::read_keys) order, that satisfies `predicate`.
    fn find_in_storage<F>(&self, mut predicate: F) -> Option<(CryptoHash, Vec<u8>)>
    where
        F: FnMut(&CryptoHash, &[u8]) -> bool,
    {
        self.read_keys().into_iter().find_map(|hash| {
            let bytes = self.read_storage(&hash)?;
            if predicate(&hash, &bytes) {
                Some((hash, bytes))
            } else {
                None
            }
        })
    }
}

/// A scoped memoization table.
///
/// Methods take `&self`: implementations use interior mutability so that read paths of the layers
/// can fill the cache.
pub trait Cache: Clone + Send + 'static {
    /// `scope` is `None` for the global namespace.
    fn read_cache(&self, scope: Option<&str>, name: &[u8]) -> Option<Vec<u8>>;

    fn write_cache(&self, scope: Option<&str>, name: &[u8], value: &[u8]);

    /* ↓↓↓ Typed helpers ↓↓↓ */

    /// Read a cached hash. Entries that do not decode are treated as misses.
    fn read_cached_hash(&self, scope: &str, name: &CryptoHash) -> Option<CryptoHash> {
        self.read_cache(Some(scope), &name.bytes())
            .and_then(|bytes| CryptoHash::deserialize(&mut bytes.as_slice()).ok())
    }

    fn write_cached_hash(&self, scope: &str, name: &CryptoHash, value: &CryptoHash) {
        // Serializing a fixed-size array into a Vec does not fail.
        if let Ok(bytes) = value.try_to_vec() {
            self.write_cache(Some(scope), &name.bytes(), &bytes)
        }
    }

    fn read_global_hash(&self, scope: &str) -> Option<CryptoHash> {
        self.read_cache(Some(scope), GLOBAL_NAME)
            .and_then(|bytes| CryptoHash::deserialize(&mut bytes.as_slice()).ok())
    }

    fn write_global_hash(&self, scope: &str, value: &CryptoHash) {
        if let Ok(bytes) = value.try_to_vec() {
            self.write_cache(Some(scope), GLOBAL_NAME, &bytes)
        }
    }
}

/// A [`Cache`] that remembers nothing. Every lookup falls back to storage.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn read_cache(&self, _scope: Option<&str>, _name: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn write_cache(&self, _scope: Option<&str>, _name: &[u8], _value: &[u8]) {}
}
