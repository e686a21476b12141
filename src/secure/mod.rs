/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The secure blocktree: typed blocks whose every write is authorized by the key hierarchy.
//!
//! ## Block types
//!
//! The tree starts with a single `root` block that holds the root key. Under it, chains of the
//! following types are created:
//!
//! |Chain type|May be created under|May hold|
//! |---|---|---|
//! |`root`|Nothing. There is exactly one.|`key`|
//! |`zone`|A `zone` chain, or the `root` chain (once, for the root zone).|`key`, `options`, `secret`|
//! |`identity`|A `zone` chain.|`key`, `options`, `secret`|
//! |`collection`|A `zone` chain.|`key`, `options`, `secret`, `record`|
//!
//! ## Authorization
//!
//! Every block other than the root block, and keys added directly to the root chain, must carry a
//! [signature](signatures) by a key that is presently authorized in the chain above the new block
//! (its parent's chain, or one of its ancestors). Keys are authorized by `key` blocks, which are in
//! turn signed by a key from further up, so every authorization chains back to a root key. See
//! [`key_scan`] for how the active keys of a chain are derived.
//!
//! Keys are never deleted: revoking a key appends a record whose activity window is empty.
//!
//! ## Writers
//!
//! Validation reads storage and then writes a single block. The root-uniqueness and sibling-nonce
//! checks therefore assume that there is only one writer at a time. [`SecureBlocktree`] enforces this
//! by requiring `&mut self` for every mutation.

pub mod key_scan;

pub mod operations;

pub mod signatures;

pub mod trusted_read;

pub mod validation;

use std::{sync::mpsc::Sender, time::SystemTime};

use typed_builder::TypedBuilder;

use crate::{
    blockchain::WriteOptions,
    blocktree::Blocktree,
    codec::{payloads::SecureData, PayloadCodec},
    errors::{BlocktreeError, InvalidRootError, InvalidSignatureError},
    events::{Event, WriteBlockEvent},
    logging,
    pluggables::{Cache, Storage, NAME_SCOPE, ROOT_ZONE_SCOPE, SYSTEM_ROOT_SCOPE},
    types::{
        block::SecureBlock,
        crypto_primitives::CryptoProvider,
        data_types::CryptoHash,
        payloads::{BlockType, Sealed},
    },
};

use signatures::EncodedSignature;

/// Stores the user-defined parameters of a [`SecureBlocktree`], that is:
/// 1. Whether [events](crate::events) should be logged.
/// 2. Whether writes should be validated by the blockchain layer (that `prev` exists, is not newer
///    than the new block, and has no successor). Key-hierarchy checks always run.
#[derive(TypedBuilder, Clone, Copy, Debug, PartialEq, Eq)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. Every field is optional:
    - `.log_events(...)` defaults to `false`.
    - `.validate_writes(...)` defaults to `true`.
"))]
pub struct Configuration {
    #[builder(default = false, setter(doc = "Set whether events are logged."))]
    pub log_events: bool,
    #[builder(
        default = true,
        setter(doc = "Set whether the blockchain layer validates every write.")
    )]
    pub validate_writes: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::builder().build()
    }
}

pub struct SecureBlocktree<S: Storage, C: Cache, P: CryptoProvider> {
    blocktree: Blocktree<S, C>,
    crypto: P,
    config: Configuration,
    event_publisher: Option<Sender<Event>>,
}

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    pub fn new(storage: S, cache: C, crypto: P, config: Configuration) -> Self {
        SecureBlocktree {
            blocktree: Blocktree::new(storage, cache),
            crypto,
            config,
            event_publisher: None,
        }
    }

    /// Send every [`Event`] emitted from now on to `event_publisher`.
    pub fn with_event_publisher(mut self, event_publisher: Sender<Event>) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }

    pub fn blocktree(&self) -> &Blocktree<S, C> {
        &self.blocktree
    }

    pub fn crypto(&self) -> &P {
        &self.crypto
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /* ↓↓↓ Reading ↓↓↓ */

    /// Read and decode the secure block stored under `hash`.
    pub fn read_secure_block(&self, hash: &CryptoHash) -> Result<SecureBlock, BlocktreeError> {
        let block = self.blocktree.read_block(hash)?;
        let (data, _) = SecureData::deserialize(&block.data, 0)?;
        Ok(SecureBlock {
            hash: block.hash,
            prev: block.prev,
            parent: block.parent,
            nonce: block.nonce,
            timestamp: block.timestamp,
            sig: data.sig,
            payload: data.payload,
        })
    }

    /// The `root` block, if it has been created.
    pub fn get_system_root(&self) -> Option<CryptoHash> {
        let cache = self.blocktree.cache();
        if let Some(root) = cache.read_global_hash(SYSTEM_ROOT_SCOPE) {
            return Some(root);
        }

        let (root, _) = self.blocktree.blockchain().find_in_blocks(|hash, block| {
            block.prev.is_none()
                && self
                    .read_secure_block(hash)
                    .map_or(false, |block| block.block_type() == BlockType::Root)
        })?;
        cache.write_global_hash(SYSTEM_ROOT_SCOPE, &root);
        Some(root)
    }

    /// The first zone created under the root chain, if it has been created.
    ///
    /// A root zone may hang off any block of the root chain, so a cache miss falls back to a scan of
    /// every stored block.
    pub fn get_root_zone(&self) -> Result<Option<CryptoHash>, BlocktreeError> {
        let cache = self.blocktree.cache();
        if let Some(root_zone) = cache.read_global_hash(ROOT_ZONE_SCOPE) {
            return Ok(Some(root_zone));
        }
        let Some(system_root) = self.get_system_root() else {
            return Ok(None);
        };

        let root_zone = self
            .blocktree
            .blockchain()
            .find_in_blocks(|hash, block| {
                block.prev.is_none() && self.is_root_zone(hash, &system_root)
            })
            .map(|(hash, _)| hash);

        if let Some(root_zone) = &root_zone {
            cache.write_global_hash(ROOT_ZONE_SCOPE, root_zone);
        }
        Ok(root_zone)
    }

    // Whether `hash` starts a zone chain nested under the root chain.
    fn is_root_zone(&self, hash: &CryptoHash, system_root: &CryptoHash) -> bool {
        let Ok(block) = self.read_secure_block(hash) else {
            return false;
        };
        if !block.is_chain_root() || block.block_type() != BlockType::Zone {
            return false;
        }
        block.parent.map_or(false, |parent| {
            self.blocktree
                .get_root_block(&parent)
                .map_or(false, |chain_root| chain_root == *system_root)
        })
    }

    /// The plaintext `name` option of the zone, identity, or collection that starts at `block`.
    pub fn get_block_name(&self, block: &CryptoHash) -> Result<Option<String>, BlocktreeError> {
        let cache = self.blocktree.cache();
        if let Some(name) = cache.read_cache(Some(NAME_SCOPE), &block.bytes()) {
            if let Ok(name) = String::from_utf8(name) {
                return Ok(Some(name));
            }
        }

        let secure_block = self.read_secure_block(block)?;
        let name = secure_block
            .payload
            .options()
            .and_then(Sealed::plain)
            .and_then(|options| options.get("name"))
            .map(str::to_string);
        if let Some(name) = &name {
            cache.write_cache(Some(NAME_SCOPE), &block.bytes(), name.as_bytes());
        }
        Ok(name)
    }

    /* ↓↓↓ Writing ↓↓↓ */

    /// Write `data` after `prev` and under `parent`, after checking the invariants that span the
    /// whole store:
    /// - A `root` block may only be written into an empty store.
    /// - A signature nonce may not already be used by another block under the same parent.
    pub(crate) fn write_secure_block(
        &mut self,
        prev: Option<&CryptoHash>,
        parent: Option<&CryptoHash>,
        data: &SecureData,
    ) -> Result<CryptoHash, BlocktreeError> {
        let block_type = data.block_type();
        if block_type == BlockType::Root {
            let block_count = self.blocktree.count_blocks();
            if block_count > 0 {
                log::debug!("Rejected root block: store already holds {} blocks", block_count);
                return Err(InvalidRootError { block_count }.into());
            }
        }

        if let (Some(parent), Some(sig)) = (parent, &data.sig) {
            let (encoded, _) = EncodedSignature::deserialize(sig, 0)?;
            self.check_sibling_nonces(parent, &encoded)?;
        }

        let bytes = data.serialize()?;
        let options = WriteOptions::builder()
            .validate(self.config.validate_writes)
            .build();
        let hash = self.blocktree.write_block(prev, parent, &bytes, &options)?;

        self.publish(Event::WriteBlock(WriteBlockEvent {
            timestamp: SystemTime::now(),
            block: hash,
            block_type,
            prev: prev.copied(),
            parent: parent.copied(),
        }));
        Ok(hash)
    }

    fn check_sibling_nonces(
        &self,
        parent: &CryptoHash,
        signature: &EncodedSignature,
    ) -> Result<(), BlocktreeError> {
        for sibling in self.blocktree.perform_child_scan(parent) {
            let Ok((data, _)) = SecureData::deserialize(&sibling.data, 0) else {
                continue;
            };
            let Some(sibling_sig) = data.sig else {
                continue;
            };
            let Ok((sibling_sig, _)) = EncodedSignature::deserialize(&sibling_sig, 0) else {
                continue;
            };
            if sibling_sig.nonce == signature.nonce {
                log::debug!(
                    "Rejected signature: nonce already used by block {} under {}",
                    sibling.hash,
                    parent
                );
                return Err(InvalidSignatureError::NonceAlreadyUsed {
                    block: sibling.hash,
                }
                .into());
            }
        }
        Ok(())
    }

    pub(crate) fn publish(&self, event: Event) {
        if self.config.log_events {
            logging::log_event(&event);
        }
        Event::publish(&self.event_publisher, event);
    }
}
