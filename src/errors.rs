/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Errors surfaced by every layer of the blocktree.
//!
//! Each kind of failure has its own enum, and all of them convert into [`BlocktreeError`] so that `?`
//! composes across the blockchain, blocktree, and secure layers. None of these errors are retried
//! internally, and a mutation that returns one of them has not written anything.

use std::fmt::{self, Display, Formatter};

use crate::types::{
    data_types::{CryptoHash, PublicKeyBytes, Timestamp},
    payloads::BlockType,
};

/// Errors that may be encountered when reading from or writing to the blocktree.
#[derive(Debug)]
pub enum BlocktreeError {
    Serialization(SerializationError),
    InvalidBlock(InvalidBlockError),
    InvalidSignature(InvalidSignatureError),
    InvalidKey(InvalidKeyError),
    InvalidRoot(InvalidRootError),
    Crypto(CryptoError),
    Broker(BrokerError),
}

impl Display for BlocktreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BlocktreeError::Serialization(err) => write!(f, "serialization error: {}", err),
            BlocktreeError::InvalidBlock(err) => write!(f, "invalid block: {}", err),
            BlocktreeError::InvalidSignature(err) => write!(f, "invalid signature: {}", err),
            BlocktreeError::InvalidKey(err) => write!(f, "invalid key: {}", err),
            BlocktreeError::InvalidRoot(err) => write!(f, "invalid root: {}", err),
            BlocktreeError::Crypto(err) => write!(f, "crypto error: {}", err),
            BlocktreeError::Broker(err) => write!(f, "broker error: {}", err),
        }
    }
}

impl std::error::Error for BlocktreeError {}

impl From<SerializationError> for BlocktreeError {
    fn from(value: SerializationError) -> Self {
        BlocktreeError::Serialization(value)
    }
}

impl From<InvalidBlockError> for BlocktreeError {
    fn from(value: InvalidBlockError) -> Self {
        BlocktreeError::InvalidBlock(value)
    }
}

impl From<InvalidSignatureError> for BlocktreeError {
    fn from(value: InvalidSignatureError) -> Self {
        BlocktreeError::InvalidSignature(value)
    }
}

impl From<InvalidKeyError> for BlocktreeError {
    fn from(value: InvalidKeyError) -> Self {
        BlocktreeError::InvalidKey(value)
    }
}

impl From<InvalidRootError> for BlocktreeError {
    fn from(value: InvalidRootError) -> Self {
        BlocktreeError::InvalidRoot(value)
    }
}

impl From<CryptoError> for BlocktreeError {
    fn from(value: CryptoError) -> Self {
        BlocktreeError::Crypto(value)
    }
}

impl From<BrokerError> for BlocktreeError {
    fn from(value: BrokerError) -> Self {
        BlocktreeError::Broker(value)
    }
}

/// Malformed or out-of-range binary fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// A hash field did not have the length of a [`CryptoHash`], or a block's bytes do not hash to the
    /// hash they were stored under.
    InvalidHash { field: &'static str, len: usize },
    /// An integer or length prefix does not fit its field, or the input ended before the field did.
    ArgumentOutOfBounds { field: &'static str },
    /// A field decoded to bytes that are not a valid value of its type (e.g., non-UTF-8 option
    /// strings or an unknown block type byte).
    InvalidEncoding { field: &'static str },
}

impl Display for SerializationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::InvalidHash { field, len } => {
                write!(f, "invalid hash in field `{}` ({} bytes)", field, len)
            }
            SerializationError::ArgumentOutOfBounds { field } => {
                write!(f, "argument out of bounds in field `{}`", field)
            }
            SerializationError::InvalidEncoding { field } => {
                write!(f, "invalid encoding in field `{}`", field)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidBlockError {
    /// No block is stored under `block`, or no block was supplied at all.
    NotFound { block: Option<CryptoHash> },
    /// The `prev` of a new block does not resolve to a stored block.
    IsNull { block: CryptoHash },
    /// A block is older than its predecessor.
    InvalidTimestamp {
        block: CryptoHash,
        timestamp: Timestamp,
    },
    /// `block` already has a successor; chains never fork.
    NextBlockExists { block: CryptoHash },
    /// The chain rooted at `block` is of a type that cannot hold a block of `block_type`.
    InvalidParentType {
        block: CryptoHash,
        found: BlockType,
        block_type: BlockType,
    },
    /// The `parent` given for an append differs from the parent fixed when the chain was created.
    ParentMismatch {
        block: CryptoHash,
        parent: Option<CryptoHash>,
    },
}

impl Display for InvalidBlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidBlockError::NotFound { block: Some(block) } => {
                write!(f, "block {} not found", block)
            }
            InvalidBlockError::NotFound { block: None } => write!(f, "no block given"),
            InvalidBlockError::IsNull { block } => {
                write!(f, "previous block {} does not exist", block)
            }
            InvalidBlockError::InvalidTimestamp { block, timestamp } => write!(
                f,
                "timestamp {} is older than that of block {}",
                timestamp, block
            ),
            InvalidBlockError::NextBlockExists { block } => {
                write!(f, "block {} already has a next block", block)
            }
            InvalidBlockError::InvalidParentType {
                block,
                found,
                block_type,
            } => write!(
                f,
                "a {} block cannot be placed under the {} chain at {}",
                block_type, found, block
            ),
            InvalidBlockError::ParentMismatch { block, parent } => write!(
                f,
                "chain of block {} does not have parent {:?}",
                block, parent
            ),
        }
    }
}

impl std::error::Error for InvalidBlockError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSignatureError {
    /// No signature was supplied, or no presently-authorized key matches the signing key.
    NotFound { key: Option<PublicKeyBytes> },
    /// The signing key is authorized, but the signature bytes fail verification.
    DoesNotMatch { key: PublicKeyBytes },
    /// A sibling under the same parent already carries a signature with this nonce.
    NonceAlreadyUsed { block: CryptoHash },
}

impl Display for InvalidSignatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidSignatureError::NotFound { key: Some(key) } => {
                write!(f, "key {} is not authorized", key)
            }
            InvalidSignatureError::NotFound { key: None } => write!(f, "no signature given"),
            InvalidSignatureError::DoesNotMatch { key } => {
                write!(f, "signature does not verify under key {}", key)
            }
            InvalidSignatureError::NonceAlreadyUsed { block } => {
                write!(f, "signature nonce was already used by block {}", block)
            }
        }
    }
}

impl std::error::Error for InvalidSignatureError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidKeyError {
    /// `key` does not chain back through its parent keys to a root key.
    UntrustedParentKey { key: PublicKeyBytes, block: CryptoHash },
    /// `key` is not a currently-valid key for the trusted read of `block`.
    NotTrusted { key: PublicKeyBytes, block: CryptoHash },
    /// The key that `block` is encrypted for is no longer authorized at `block`.
    NotAuthorized { key: PublicKeyBytes, block: CryptoHash },
}

impl Display for InvalidKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidKeyError::UntrustedParentKey { key, block } => write!(
                f,
                "key {} does not chain back to a root key from block {}",
                key, block
            ),
            InvalidKeyError::NotTrusted { key, block } => {
                write!(f, "key {} is not trusted at block {}", key, block)
            }
            InvalidKeyError::NotAuthorized { key, block } => {
                write!(f, "key {} is not authorized at block {}", key, block)
            }
        }
    }
}

impl std::error::Error for InvalidKeyError {}

/// An attempt to create a root block when blocks already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRootError {
    pub block_count: u64,
}

impl Display for InvalidRootError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot create a root block in a store holding {} blocks",
            self.block_count
        )
    }
}

impl std::error::Error for InvalidRootError {}

/// Failures of the [`CryptoProvider`](crate::types::crypto_primitives::CryptoProvider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidPublicKey,
    InvalidPrivateKey,
    MalformedCiphertext,
    EncryptionFailed,
    DecryptionFailed,
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidPublicKey => write!(f, "invalid public key"),
            CryptoError::InvalidPrivateKey => write!(f, "invalid private key"),
            CryptoError::MalformedCiphertext => write!(f, "malformed ciphertext"),
            CryptoError::EncryptionFailed => write!(f, "encryption failed"),
            CryptoError::DecryptionFailed => write!(f, "decryption failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Failures reported by a [`Broker`](crate::broker::Broker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker holds no private key for `key`.
    UnknownAuthorizedKey { key: PublicKeyBytes },
    /// The broker refused to re-encrypt, e.g., because the token signature did not verify.
    Rejected { reason: String },
    /// The broker answered without any re-encrypted secret.
    EmptyResponse,
    Crypto(CryptoError),
}

impl Display for BrokerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::UnknownAuthorizedKey { key } => {
                write!(f, "no private key held for {}", key)
            }
            BrokerError::Rejected { reason } => write!(f, "request rejected: {}", reason),
            BrokerError::EmptyResponse => write!(f, "no secrets returned"),
            BrokerError::Crypto(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BrokerError {}

impl From<CryptoError> for BrokerError {
    fn from(value: CryptoError) -> Self {
        BrokerError::Crypto(value)
    }
}
