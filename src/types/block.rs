/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the block types of each layer and their encodings.
//!
//! The three layers nest: a [`SecureBlock`] is a [`TreeBlock`] whose data is a typed payload, and a
//! [`TreeBlock`] is a raw [`Block`] whose data starts with a parent pointer.
//!
//! ```text
//! Block:      prev (32) || nonce (4) || timestamp (8) || data
//! TreeBlock:                                             parent-len (1) || parent || data
//! SecureBlock:                                                                       type (1) || sig-len (2) || sig || payload
//! ```

use crate::{
    codec::{PayloadCodec, Reader, Writer},
    errors::SerializationError,
};

use super::{
    crypto_primitives::sha256,
    data_types::{BlockNonce, CryptoHash, Timestamp},
    payloads::{BlockType, SecurePayload},
};

/// A block of the blockchain layer: opaque data appended to a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The previous block in the same chain. `None` for the first block of a chain.
    pub prev: Option<CryptoHash>,
    pub nonce: BlockNonce,
    pub timestamp: Timestamp,
    pub data: Vec<u8>,
}

impl Block {
    /// The content hash of this block, under which it is stored.
    pub fn hash(&self) -> CryptoHash {
        sha256(&self.to_bytes())
    }

    /// The stored representation of this block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write_fields(&mut writer);
        writer.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Block, SerializationError> {
        Ok(Block::deserialize(bytes, 0)?.0)
    }

    fn write_fields(&self, writer: &mut Writer) {
        writer.hash(self.prev.as_ref());
        writer.raw(&self.nonce.bytes());
        writer.i64(self.timestamp.int());
        writer.raw(&self.data);
    }
}

impl PayloadCodec for Block {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        self.write_fields(writer);
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let prev = reader.hash("prev")?;
        let nonce = BlockNonce::new(reader.fixed("nonce")?);
        let timestamp = Timestamp::new(reader.i64("timestamp")?);
        let data = reader.remaining().to_vec();
        Ok(Block {
            prev,
            nonce,
            timestamp,
            data,
        })
    }
}

/// A block of the blocktree layer: a raw block that additionally points at the block, in another
/// chain, under which its chain is nested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeBlock {
    pub hash: CryptoHash,
    pub prev: Option<CryptoHash>,
    /// `None` for the chains at the top of the tree.
    pub parent: Option<CryptoHash>,
    pub nonce: BlockNonce,
    pub timestamp: Timestamp,
    pub data: Vec<u8>,
}

impl TreeBlock {
    /// Prefix `data` with the `parent` pointer.
    pub fn encode_data(parent: Option<&CryptoHash>, data: &[u8]) -> Vec<u8> {
        let mut writer = Writer::new();
        match parent {
            Some(parent) => {
                writer.u8(CryptoHash::LEN as u8);
                writer.hash(Some(parent));
            }
            None => writer.u8(0),
        }
        writer.raw(data);
        writer.into_bytes()
    }

    /// Split the data of a raw block into its `parent` pointer and the remaining data.
    pub fn decode_data(bytes: &[u8]) -> Result<(Option<CryptoHash>, Vec<u8>), SerializationError> {
        let mut reader = Reader::new(bytes, 0);
        let parent = match reader.u8("parent")? as usize {
            0 => None,
            CryptoHash::LEN => reader.hash("parent")?,
            len => {
                return Err(SerializationError::InvalidHash {
                    field: "parent",
                    len,
                })
            }
        };
        Ok((parent, reader.remaining().to_vec()))
    }

    pub fn from_block(hash: CryptoHash, block: Block) -> Result<TreeBlock, SerializationError> {
        let (parent, data) = TreeBlock::decode_data(&block.data)?;
        Ok(TreeBlock {
            hash,
            prev: block.prev,
            parent,
            nonce: block.nonce,
            timestamp: block.timestamp,
            data,
        })
    }
}

/// A block of the secure layer: a tree block carrying a signature and a typed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureBlock {
    pub hash: CryptoHash,
    pub prev: Option<CryptoHash>,
    pub parent: Option<CryptoHash>,
    pub nonce: BlockNonce,
    pub timestamp: Timestamp,
    /// The encoded [signature](crate::secure::signatures::EncodedSignature) that authorized this
    /// block, if it needed one.
    pub sig: Option<Vec<u8>>,
    pub payload: SecurePayload,
}

impl SecureBlock {
    pub fn block_type(&self) -> BlockType {
        self.payload.block_type()
    }

    /// Whether this block starts its chain.
    pub fn is_chain_root(&self) -> bool {
        self.prev.is_none()
    }
}
