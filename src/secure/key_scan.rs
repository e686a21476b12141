/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deriving [`KeyRecord`]s from the `root` and `key` blocks of the tree.
//!
//! Key records are never stored as such. They are recovered by scanning a chain from its head back to
//! its root, and optionally continuing into the chain it is nested under, and so on up the tree.
//! Because the scan runs newest-first, the most recent record of a key in a chain decides whether
//! the key is active there: an inactive record (a revocation, or an expired window) hides every older
//! record of the same key in that chain.

use std::collections::HashSet;

use typed_builder::TypedBuilder;

use crate::{
    errors::BlocktreeError,
    pluggables::{Cache, Storage},
    types::{
        crypto_primitives::CryptoProvider,
        data_types::{CryptoHash, PublicKeyBytes, Timestamp},
        keys::{Action, KeyRecord},
    },
};

use super::SecureBlocktree;

/// Parameters of [`SecureBlocktree::perform_key_scan`].
#[derive(TypedBuilder, Clone, Debug)]
pub struct KeyScan {
    /// Any block of the chain to start scanning from.
    pub block: CryptoHash,
    /// Continue into the parent chain after exhausting a chain.
    #[builder(default = false)]
    pub is_recursive: bool,
    /// Skip records that are not active at `timestamp`, along with every older record of their key.
    #[builder(default = true)]
    pub is_active: bool,
    /// Only return records that permit this action.
    #[builder(default, setter(strip_option))]
    pub action: Option<Action>,
    /// Only return the first record of this key.
    #[builder(default, setter(strip_option))]
    pub key: Option<PublicKeyBytes>,
    /// Defaults to the current time.
    #[builder(default, setter(strip_option))]
    pub timestamp: Option<Timestamp>,
}

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    /// Collect the key records visible from `scan.block`: those of its chain, newest first, followed
    /// (if `scan.is_recursive`) by those of each ancestor chain.
    ///
    /// If `scan.key` is set, stops at and returns only the first matching record.
    pub fn perform_key_scan(&self, scan: &KeyScan) -> Result<Vec<KeyRecord>, BlocktreeError> {
        let timestamp = scan.timestamp.unwrap_or_else(Timestamp::now);
        let mut records = Vec::new();
        let mut chain = Some(scan.block);

        while let Some(chain_block) = chain {
            let mut inactive_keys = HashSet::new();
            let mut current = Some(self.blocktree.get_head_block(&chain_block)?);
            let mut root = chain_block;

            while let Some(hash) = current {
                let block = self.read_secure_block(&hash)?;
                root = hash;
                current = block.prev;

                let Some(payload) = block.payload.key_payload() else {
                    continue;
                };
                let record = KeyRecord {
                    key: payload.key.clone(),
                    parent_key: payload.parent_key.clone(),
                    action: payload.action,
                    ts_init: payload.ts_init,
                    ts_exp: payload.ts_exp,
                    block: hash,
                };

                if scan.is_active {
                    if inactive_keys.contains(&record.key) {
                        continue;
                    }
                    if !record.is_active_at(timestamp) {
                        inactive_keys.insert(record.key);
                        continue;
                    }
                }

                let action_matches = scan
                    .action
                    .map_or(true, |action| record.action.permits(action));
                let key_matches = scan.key.as_ref().map_or(true, |key| *key == record.key);
                if action_matches && key_matches {
                    if scan.key.is_some() {
                        return Ok(vec![record]);
                    }
                    records.push(record);
                }
            }

            chain = if scan.is_recursive {
                self.blocktree.get_parent_block(&root)?
            } else {
                None
            };
        }

        Ok(records)
    }

    /// The first active record of `key` permitting `action`, searching from the chain of `block` up
    /// the tree.
    pub fn perform_key_seek(
        &self,
        block: &CryptoHash,
        action: Action,
        key: &PublicKeyBytes,
        timestamp: Timestamp,
    ) -> Result<Option<KeyRecord>, BlocktreeError> {
        let scan = KeyScan::builder()
            .block(*block)
            .is_recursive(true)
            .action(action)
            .key(key.clone())
            .timestamp(timestamp)
            .build();
        Ok(self.perform_key_scan(&scan)?.pop())
    }

    /// Whether `key` chains back through parent keys to a root of trust.
    ///
    /// The oldest active `write` record of `key` visible from `block` is followed to its parent key,
    /// which must in turn be validated from the chain above the record's chain. Validation succeeds
    /// when a record without a parent key is reached. If `is_recursive` is `false`, only a key that
    /// is itself a root of trust validates.
    pub fn validate_parent_key(
        &self,
        block: &CryptoHash,
        key: &PublicKeyBytes,
        timestamp: Timestamp,
        is_recursive: bool,
    ) -> Result<bool, BlocktreeError> {
        let scan = KeyScan::builder()
            .block(*block)
            .is_recursive(true)
            .action(Action::Write)
            .timestamp(timestamp)
            .build();
        let records = self.perform_key_scan(&scan)?;
        let Some(record) = records.into_iter().rev().find(|record| record.key == *key) else {
            log::debug!("Key {} has no active write record above {}", key, block);
            return Ok(false);
        };

        if record.is_root() {
            return Ok(true);
        }
        let Some(parent_key) = record.parent_key.filter(|_| is_recursive) else {
            return Ok(false);
        };

        let record_chain = self.blocktree.get_root_block(&record.block)?;
        match self.blocktree.get_parent_block(&record_chain)? {
            Some(parent) => self.validate_parent_key(&parent, &parent_key, timestamp, true),
            None => Ok(false),
        }
    }
}
