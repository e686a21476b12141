/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The blocktree layer: a tree of blockchains.
//!
//! Every chain is nested under a block of another chain, its *parent*, which is fixed when the
//! chain's first block is written and repeated in every later block of the chain. Chains whose
//! parent is `None` sit at the top of the tree.
//!
//! Chain-local operations (appending, and finding a chain's root, head, or next block) are those of
//! the underlying [`Blockchain`].

use crate::{
    blockchain::{Blockchain, ChainValidation, InvalidChainReason, WriteOptions},
    errors::{BlocktreeError, InvalidBlockError},
    pluggables::{Cache, Storage},
    types::{block::TreeBlock, data_types::CryptoHash},
};

pub struct Blocktree<S: Storage, C: Cache> {
    blockchain: Blockchain<S, C>,
}

impl<S: Storage, C: Cache> Blocktree<S, C> {
    pub fn new(storage: S, cache: C) -> Self {
        Blocktree {
            blockchain: Blockchain::new(storage, cache),
        }
    }

    pub fn blockchain(&self) -> &Blockchain<S, C> {
        &self.blockchain
    }

    pub fn cache(&self) -> &C {
        self.blockchain.cache()
    }

    /// Write a block holding `data` nested under `parent`, appended after `prev` or starting a new
    /// chain.
    ///
    /// # Errors
    ///
    /// Besides the errors of [`Blockchain::write_block`], if `options.validate` is set, appending to
    /// a chain with a `parent` other than the chain's own fails with
    /// [`InvalidBlockError::ParentMismatch`].
    pub fn write_block(
        &mut self,
        prev: Option<&CryptoHash>,
        parent: Option<&CryptoHash>,
        data: &[u8],
        options: &WriteOptions,
    ) -> Result<CryptoHash, BlocktreeError> {
        if options.validate {
            if let Some(prev) = prev {
                if let Some(prev_block) = self.try_read_block(prev)? {
                    if prev_block.parent.as_ref() != parent {
                        log::debug!(
                            "Rejected block: chain of {} is not nested under {:?}",
                            prev,
                            parent
                        );
                        return Err(InvalidBlockError::ParentMismatch {
                            block: *prev,
                            parent: parent.copied(),
                        }
                        .into());
                    }
                }
            }
        }

        let data = TreeBlock::encode_data(parent, data);
        self.blockchain.write_block(prev, &data, options)
    }

    pub fn read_block(&self, hash: &CryptoHash) -> Result<TreeBlock, BlocktreeError> {
        let block = self.blockchain.read_block(hash)?;
        Ok(TreeBlock::from_block(*hash, block)?)
    }

    pub fn try_read_block(&self, hash: &CryptoHash) -> Result<Option<TreeBlock>, BlocktreeError> {
        match self.blockchain.try_read_block(hash)? {
            Some(block) => Ok(Some(TreeBlock::from_block(*hash, block)?)),
            None => Ok(None),
        }
    }

    /// The block that the chain of `hash` is nested under.
    pub fn get_parent_block(&self, hash: &CryptoHash) -> Result<Option<CryptoHash>, BlocktreeError> {
        Ok(self.read_block(hash)?.parent)
    }

    /// Every block nested directly under `parent`, in storage order.
    pub fn perform_child_scan(&self, parent: &CryptoHash) -> Vec<TreeBlock> {
        self.blockchain
            .map_in_blocks(|hash, block| {
                let tree_block = TreeBlock::from_block(*hash, block.clone()).ok()?;
                (tree_block.parent.as_ref() == Some(parent)).then_some(tree_block)
            })
            .into_iter()
            .flatten()
            .collect()
    }

    /// The roots of the chains from `hash` up to the top of the tree: first the root of the chain
    /// of `hash`, then the root of the chain of its parent, and so on.
    pub fn perform_parent_scan(&self, hash: &CryptoHash) -> Result<Vec<CryptoHash>, BlocktreeError> {
        let mut roots = Vec::new();
        let mut current = Some(*hash);
        while let Some(block) = current {
            let root = self.get_root_block(&block)?;
            roots.push(root);
            current = self.get_parent_block(&root)?;
        }
        Ok(roots)
    }

    /// Validate the chain of `hash` and then, transitively, the chain of each of its ancestors.
    ///
    /// `block_count` of the result counts the blocks of every chain visited.
    pub fn validate_blocktree(&self, hash: &CryptoHash) -> ChainValidation {
        let mut block_count = 0;
        let mut current = *hash;
        loop {
            let validation = self.blockchain.validate_blockchain(&current);
            block_count += validation.block_count;
            if !validation.is_valid {
                return ChainValidation {
                    block_count,
                    ..validation
                };
            }

            // The chain validated, so its root is readable.
            let parent = self
                .blockchain
                .get_root_block(&current)
                .and_then(|root| self.get_parent_block(&root));
            match parent {
                Ok(Some(parent)) => current = parent,
                Ok(None) => return ChainValidation::valid(block_count),
                Err(err) => {
                    log::debug!("Blocktree of {} has an unreadable chain root: {}", hash, err);
                    return ChainValidation::invalid(
                        InvalidChainReason::MissingBlock,
                        current,
                        block_count,
                    );
                }
            }
        }
    }

    /* ↓↓↓ Chain-local operations ↓↓↓ */

    pub fn get_root_block(&self, hash: &CryptoHash) -> Result<CryptoHash, BlocktreeError> {
        self.blockchain.get_root_block(hash)
    }

    pub fn get_head_block(&self, hash: &CryptoHash) -> Result<CryptoHash, BlocktreeError> {
        self.blockchain.get_head_block(hash)
    }

    pub fn get_next_block(&self, hash: &CryptoHash) -> Option<CryptoHash> {
        self.blockchain.get_next_block(hash)
    }

    pub fn count_blocks(&self) -> u64 {
        self.blockchain.count_blocks()
    }
}
