/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The blockchain layer: linear, hash-linked chains of opaque data.
//!
//! Every block names the block before it in its chain through its `prev` hash, and chains never
//! fork: when writes are validated, a block can only be appended to a chain's current head, and
//! only with a timestamp no older than that head's.
//!
//! Any number of chains share the same [`Storage`]. The layer resolves a block's chain root, head,
//! and successor by walking storage, and memoizes the answers in the [`Cache`] under the
//! [`ROOT_SCOPE`], [`HEAD_SCOPE`], and [`NEXT_SCOPE`] scopes.

use rand_core::{OsRng, RngCore};
use typed_builder::TypedBuilder;

use crate::{
    errors::{BlocktreeError, InvalidBlockError, SerializationError},
    pluggables::{Cache, Storage, HEAD_SCOPE, NEXT_SCOPE, ROOT_SCOPE},
    types::{
        block::Block,
        data_types::{BlockNonce, CryptoHash, Timestamp},
    },
};

/// Options for [`Blockchain::write_block`].
#[derive(TypedBuilder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    /// Check that `prev` exists, is not younger than the new block, and has no successor yet.
    #[builder(default = true)]
    pub validate: bool,
    /// Timestamp to give the new block instead of the current time.
    #[builder(default, setter(strip_option))]
    pub timestamp: Option<Timestamp>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            validate: true,
            timestamp: None,
        }
    }
}

/// Why [`Blockchain::validate_blockchain`] rejected a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidChainReason {
    /// A block on the way to the chain root is absent from storage or cannot be decoded.
    MissingBlock,
    /// A block is older than the block before it.
    InvalidTimestamp,
}

/// The result of walking a chain from some block back to its root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainValidation {
    pub is_valid: bool,
    pub reason: Option<InvalidChainReason>,
    /// The offending block, if the chain is invalid.
    pub block: Option<CryptoHash>,
    /// Number of blocks successfully visited.
    pub block_count: u64,
}

impl ChainValidation {
    pub(crate) fn valid(block_count: u64) -> Self {
        ChainValidation {
            is_valid: true,
            reason: None,
            block: None,
            block_count,
        }
    }

    pub(crate) fn invalid(reason: InvalidChainReason, block: CryptoHash, block_count: u64) -> Self {
        ChainValidation {
            is_valid: false,
            reason: Some(reason),
            block: Some(block),
            block_count,
        }
    }
}

pub struct Blockchain<S: Storage, C: Cache> {
    storage: S,
    cache: C,
}

impl<S: Storage, C: Cache> Blockchain<S, C> {
    pub fn new(storage: S, cache: C) -> Self {
        Blockchain { storage, cache }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /* ↓↓↓ Writing ↓↓↓ */

    /// Append a block holding `data` after `prev`, or start a new chain if `prev` is `None`.
    ///
    /// Returns the hash of the new block.
    ///
    /// # Errors
    ///
    /// If `options.validate` is set:
    /// - [`InvalidBlockError::IsNull`] if `prev` is not a stored block.
    /// - [`SerializationError`] if `prev` is stored but does not decode to the block it names.
    /// - [`InvalidBlockError::InvalidTimestamp`] if the new block would be older than `prev`.
    /// - [`InvalidBlockError::NextBlockExists`] if `prev` already has a successor.
    pub fn write_block(
        &mut self,
        prev: Option<&CryptoHash>,
        data: &[u8],
        options: &WriteOptions,
    ) -> Result<CryptoHash, BlocktreeError> {
        let timestamp = options.timestamp.unwrap_or_else(Timestamp::now);

        if options.validate {
            if let Some(prev) = prev {
                self.validate_append(prev, timestamp)?;
            }
        }

        let mut nonce = [0u8; 4];
        OsRng.fill_bytes(&mut nonce);
        let block = Block {
            prev: prev.copied(),
            nonce: BlockNonce::new(nonce),
            timestamp,
            data: data.to_vec(),
        };
        let bytes = block.to_bytes();
        let hash = self.storage.write_storage(&block.hash(), &bytes);

        self.remember_append(prev, &hash);
        Ok(hash)
    }

    fn validate_append(
        &self,
        prev: &CryptoHash,
        timestamp: Timestamp,
    ) -> Result<(), BlocktreeError> {
        let Some(prev_block) = self.try_read_block(prev)? else {
            log::debug!("Rejected block: previous block {} does not exist", prev);
            return Err(InvalidBlockError::IsNull { block: *prev }.into());
        };

        if timestamp < prev_block.timestamp {
            log::debug!(
                "Rejected block: timestamp {} is older than {} of previous block {}",
                timestamp,
                prev_block.timestamp,
                prev
            );
            return Err(InvalidBlockError::InvalidTimestamp {
                block: *prev,
                timestamp,
            }
            .into());
        }

        if self.get_next_block(prev).is_some() {
            log::debug!("Rejected block: previous block {} already has a next block", prev);
            return Err(InvalidBlockError::NextBlockExists { block: *prev }.into());
        }

        Ok(())
    }

    // Record what is known about the chain after `hash` was appended to it.
    fn remember_append(&self, prev: Option<&CryptoHash>, hash: &CryptoHash) {
        match prev {
            None => {
                self.cache.write_cached_hash(ROOT_SCOPE, hash, hash);
                self.cache.write_cached_hash(HEAD_SCOPE, hash, hash);
            }
            Some(prev) => {
                // An unvalidated write may fork a chain. Keep the first successor.
                if self.cache.read_cached_hash(NEXT_SCOPE, prev).is_none() {
                    self.cache.write_cached_hash(NEXT_SCOPE, prev, hash);
                }
                if let Some(root) = self.cache.read_cached_hash(ROOT_SCOPE, prev) {
                    self.cache.write_cached_hash(ROOT_SCOPE, hash, &root);
                    self.cache.write_cached_hash(HEAD_SCOPE, &root, hash);
                }
            }
        }
    }

    /* ↓↓↓ Reading ↓↓↓ */

    /// Read the block stored under `hash`.
    ///
    /// # Errors
    ///
    /// [`InvalidBlockError::NotFound`] if no block is stored under `hash` (in particular, if `hash` is
    /// the null hash), and [`SerializationError::InvalidHash`] if the stored bytes do not hash to
    /// `hash`.
    pub fn read_block(&self, hash: &CryptoHash) -> Result<Block, BlocktreeError> {
        self.try_read_block(hash)?.ok_or_else(|| {
            InvalidBlockError::NotFound {
                block: Some(*hash),
            }
            .into()
        })
    }

    /// Like [`read_block`](Self::read_block), but returns `None` instead of failing if no block is
    /// stored under `hash`.
    pub fn try_read_block(&self, hash: &CryptoHash) -> Result<Option<Block>, BlocktreeError> {
        if hash.is_null() {
            return Ok(None);
        }
        let Some(bytes) = self.storage.read_storage(hash) else {
            return Ok(None);
        };
        let block = Block::from_bytes(&bytes)?;
        if block.hash() != *hash {
            return Err(SerializationError::InvalidHash {
                field: "block",
                len: bytes.len(),
            }
            .into());
        }
        Ok(Some(block))
    }

    /// The block whose `prev` is `hash`, if any.
    pub fn get_next_block(&self, hash: &CryptoHash) -> Option<CryptoHash> {
        if let Some(next) = self.cache.read_cached_hash(NEXT_SCOPE, hash) {
            return Some(next);
        }

        let prev_bytes = hash.bytes();
        let (next, _) = self
            .storage
            .find_in_storage(|_, bytes| bytes.get(..CryptoHash::LEN) == Some(&prev_bytes[..]))?;
        self.cache.write_cached_hash(NEXT_SCOPE, hash, &next);
        Some(next)
    }

    /// The first block of the chain that `hash` belongs to.
    pub fn get_root_block(&self, hash: &CryptoHash) -> Result<CryptoHash, BlocktreeError> {
        let mut visited = Vec::new();
        let mut current = *hash;
        let root = loop {
            if let Some(root) = self.cache.read_cached_hash(ROOT_SCOPE, &current) {
                break root;
            }
            let block = self.read_block(&current)?;
            visited.push(current);
            match block.prev {
                Some(prev) => current = prev,
                None => break current,
            }
        };

        for block in visited {
            self.cache.write_cached_hash(ROOT_SCOPE, &block, &root);
        }
        Ok(root)
    }

    /// The last block of the chain that `hash` belongs to.
    pub fn get_head_block(&self, hash: &CryptoHash) -> Result<CryptoHash, BlocktreeError> {
        let root = self.get_root_block(hash)?;
        let mut head = self
            .cache
            .read_cached_hash(HEAD_SCOPE, &root)
            .unwrap_or(root);
        while let Some(next) = self.get_next_block(&head) {
            head = next;
        }
        self.cache.write_cached_hash(HEAD_SCOPE, &root, &head);
        Ok(head)
    }

    /* ↓↓↓ Scans ↓↓↓ */

    /// The first stored block, in storage order, that satisfies `predicate`. Blocks that do not decode
    /// are skipped.
    pub fn find_in_blocks<F>(&self, mut predicate: F) -> Option<(CryptoHash, Block)>
    where
        F: FnMut(&CryptoHash, &Block) -> bool,
    {
        let (hash, bytes) = self.storage.find_in_storage(|hash, bytes| {
            Block::from_bytes(bytes).map_or(false, |block| predicate(hash, &block))
        })?;
        let block = Block::from_bytes(&bytes).ok()?;
        Some((hash, block))
    }

    /// Apply `f` to every stored block, in storage order. Blocks that do not decode are skipped.
    pub fn map_in_blocks<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&CryptoHash, &Block) -> T,
    {
        self.storage
            .map_in_storage(|hash, bytes| Block::from_bytes(bytes).ok().map(|block| f(hash, &block)))
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn count_blocks(&self) -> u64 {
        self.storage.count_in_storage()
    }

    /// Walk from `hash` back to the root of its chain, checking that every block is present and no
    /// older than the block before it.
    pub fn validate_blockchain(&self, hash: &CryptoHash) -> ChainValidation {
        let mut block_count = 0;
        let mut current = *hash;
        let mut successor: Option<(CryptoHash, Timestamp)> = None;

        loop {
            let block = match self.try_read_block(&current) {
                Ok(Some(block)) => block,
                _ => {
                    log::debug!("Chain of {} is missing block {}", hash, current);
                    return ChainValidation::invalid(
                        InvalidChainReason::MissingBlock,
                        current,
                        block_count,
                    );
                }
            };

            if let Some((successor, timestamp)) = successor {
                if timestamp < block.timestamp {
                    log::debug!(
                        "Chain of {} has block {} older than its previous block {}",
                        hash,
                        successor,
                        current
                    );
                    return ChainValidation::invalid(
                        InvalidChainReason::InvalidTimestamp,
                        successor,
                        block_count,
                    );
                }
            }
            block_count += 1;

            match block.prev {
                Some(prev) => {
                    successor = Some((current, block.timestamp));
                    current = prev;
                }
                None => return ChainValidation::valid(block_count),
            }
        }
    }
}
