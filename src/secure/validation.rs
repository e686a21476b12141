/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Placement rules: which chains a block of each type may be appended to or created under.

use crate::{
    errors::{BlocktreeError, InvalidBlockError},
    pluggables::{Cache, Storage},
    types::{crypto_primitives::CryptoProvider, data_types::CryptoHash, payloads::BlockType},
};

use super::SecureBlocktree;

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    /// Check that a block of `block_type` may be placed after `prev`, or, if `prev` is `None`, as the
    /// first block of a new chain under `parent`. Returns the parent the new block must carry.
    ///
    /// Appends are checked against [`BlockType::chain_types`] using the type of the chain's first
    /// block, and new chains against [`BlockType::parent_block_types`] using the type of the first
    /// block of `parent`'s chain. The first zone may be created under the root chain.
    ///
    /// # Errors
    ///
    /// - [`InvalidBlockError::NotFound`] if neither `prev` nor `parent` is given, or they are not
    ///   stored.
    /// - [`InvalidBlockError::InvalidParentType`] if the placement is not allowed.
    pub fn validate_parent_block(
        &self,
        prev: Option<&CryptoHash>,
        parent: Option<&CryptoHash>,
        block_type: BlockType,
    ) -> Result<Option<CryptoHash>, BlocktreeError> {
        match prev {
            Some(prev) => {
                let chain_root = self.blocktree.get_root_block(prev)?;
                let chain_block = self.read_secure_block(&chain_root)?;
                let found = chain_block.block_type();
                if !block_type.chain_types().contains(&found) {
                    log::debug!(
                        "Rejected {} block: cannot be appended to a {} chain",
                        block_type,
                        found
                    );
                    return Err(InvalidBlockError::InvalidParentType {
                        block: chain_root,
                        found,
                        block_type,
                    }
                    .into());
                }
                Ok(chain_block.parent)
            }
            None => {
                let parent = parent.ok_or(InvalidBlockError::NotFound { block: None })?;
                let parent_chain_root = self.blocktree.get_root_block(parent)?;
                let found = self.read_secure_block(&parent_chain_root)?.block_type();

                let is_first_zone = block_type == BlockType::Zone
                    && found == BlockType::Root
                    && self.get_root_zone()?.is_none();
                if !block_type.parent_block_types().contains(&found) && !is_first_zone {
                    log::debug!(
                        "Rejected {} block: cannot be created under a {} chain",
                        block_type,
                        found
                    );
                    return Err(InvalidBlockError::InvalidParentType {
                        block: *parent,
                        found,
                        block_type,
                    }
                    .into());
                }
                Ok(Some(*parent))
            }
        }
    }
}
