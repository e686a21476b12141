/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The typed payloads carried by secure blocks.
//!
//! Every secure block has a [`BlockType`], which decides both the shape of its payload and where in
//! the tree of chains the block may be placed. Binary encodings for these types live in
//! [`codec::payloads`](crate::codec::payloads).

use std::fmt::{self, Display, Formatter};

use super::{
    data_types::{PublicKeyBytes, Timestamp},
    keys::Action,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    Root,
    Key,
    Zone,
    Identity,
    Collection,
    Options,
    Secret,
    Record,
}

impl BlockType {
    pub const fn to_byte(self) -> u8 {
        match self {
            BlockType::Root => 0,
            BlockType::Key => 1,
            BlockType::Zone => 2,
            BlockType::Identity => 3,
            BlockType::Collection => 4,
            BlockType::Options => 5,
            BlockType::Secret => 6,
            BlockType::Record => 7,
        }
    }

    pub const fn from_byte(byte: u8) -> Option<BlockType> {
        match byte {
            0 => Some(BlockType::Root),
            1 => Some(BlockType::Key),
            2 => Some(BlockType::Zone),
            3 => Some(BlockType::Identity),
            4 => Some(BlockType::Collection),
            5 => Some(BlockType::Options),
            6 => Some(BlockType::Secret),
            7 => Some(BlockType::Record),
            _ => None,
        }
    }

    /// Types of chain that a new chain of this type may be created under.
    ///
    /// A zone may additionally be created directly under the root chain, but only once: that zone
    /// becomes the root zone.
    pub const fn parent_block_types(self) -> &'static [BlockType] {
        match self {
            BlockType::Zone => &[BlockType::Zone],
            BlockType::Identity | BlockType::Collection => &[BlockType::Zone],
            _ => &[],
        }
    }

    /// Types of chain that a block of this type may be appended to.
    pub const fn chain_types(self) -> &'static [BlockType] {
        match self {
            BlockType::Key => &[
                BlockType::Root,
                BlockType::Zone,
                BlockType::Identity,
                BlockType::Collection,
            ],
            BlockType::Options | BlockType::Secret => {
                &[BlockType::Zone, BlockType::Identity, BlockType::Collection]
            }
            BlockType::Record => &[BlockType::Collection],
            _ => &[],
        }
    }

    /// Whether the payload of this type may be stored as an [`EncryptedData`] envelope.
    pub const fn is_encryptable(self) -> bool {
        matches!(
            self,
            BlockType::Zone | BlockType::Identity | BlockType::Collection | BlockType::Options
        )
    }
}

impl Display for BlockType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Root => "root",
            BlockType::Key => "key",
            BlockType::Zone => "zone",
            BlockType::Identity => "identity",
            BlockType::Collection => "collection",
            BlockType::Options => "options",
            BlockType::Secret => "secret",
            BlockType::Record => "record",
        };
        f.write_str(name)
    }
}

/// Payload of `root` and `key` blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPayload {
    /// Key that signed this record into existence. `None` for root keys.
    pub parent_key: Option<PublicKeyBytes>,
    pub key: PublicKeyBytes,
    pub action: Action,
    pub ts_init: Timestamp,
    pub ts_exp: Timestamp,
    /// Opaque trailing bytes.
    pub data: Vec<u8>,
}

impl KeyPayload {
    /// The payload of the system root block: an unconditionally trusted key.
    pub fn root(key: PublicKeyBytes) -> Self {
        KeyPayload {
            parent_key: None,
            key,
            action: Action::Any,
            ts_init: Timestamp::ZERO,
            ts_exp: Timestamp::MAX,
            data: Vec::new(),
        }
    }
}

/// Ordered string key/value pairs attached to zones, identities, collections, and options blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockOptions(Vec<(String, String)>);

impl BlockOptions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `key` to `value`, replacing an existing entry with the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BlockOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = BlockOptions::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

/// A typed payload encrypted for `key`, such that only the holder of the matching private key (or a
/// broker acting on its behalf) can decode it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    pub key: PublicKeyBytes,
    pub encrypted_data: Vec<u8>,
}

/// Either a plaintext payload or an encrypted envelope around one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sealed<T> {
    Plain(T),
    Encrypted(EncryptedData),
}

impl<T> Sealed<T> {
    pub fn plain(&self) -> Option<&T> {
        match self {
            Sealed::Plain(payload) => Some(payload),
            Sealed::Encrypted(_) => None,
        }
    }

    pub fn encrypted(&self) -> Option<&EncryptedData> {
        match self {
            Sealed::Plain(_) => None,
            Sealed::Encrypted(envelope) => Some(envelope),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Sealed::Encrypted(_))
    }
}

impl<T: Default> Default for Sealed<T> {
    fn default() -> Self {
        Sealed::Plain(T::default())
    }
}

impl From<BlockOptions> for Sealed<BlockOptions> {
    fn from(options: BlockOptions) -> Self {
        Sealed::Plain(options)
    }
}

impl<T> From<EncryptedData> for Sealed<T> {
    fn from(envelope: EncryptedData) -> Self {
        Sealed::Encrypted(envelope)
    }
}

/// Payload of `secret` blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretPayload {
    /// Key the secret is encrypted for.
    pub key: PublicKeyBytes,
    /// Caller-chosen name the secret is looked up by.
    pub reference: String,
    pub secret: Vec<u8>,
    pub ts_init: Timestamp,
    pub ts_exp: Timestamp,
}

/// Payload of `record` blocks: opaque, ledger-style entries in a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPayload {
    pub data: Vec<u8>,
}

/// The typed payload of a secure block, tagged by [`BlockType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecurePayload {
    Root(KeyPayload),
    Key(KeyPayload),
    Zone(Sealed<BlockOptions>),
    Identity(Sealed<BlockOptions>),
    Collection(Sealed<BlockOptions>),
    Options(Sealed<BlockOptions>),
    Secret(SecretPayload),
    Record(RecordPayload),
}

impl SecurePayload {
    pub fn block_type(&self) -> BlockType {
        match self {
            SecurePayload::Root(_) => BlockType::Root,
            SecurePayload::Key(_) => BlockType::Key,
            SecurePayload::Zone(_) => BlockType::Zone,
            SecurePayload::Identity(_) => BlockType::Identity,
            SecurePayload::Collection(_) => BlockType::Collection,
            SecurePayload::Options(_) => BlockType::Options,
            SecurePayload::Secret(_) => BlockType::Secret,
            SecurePayload::Record(_) => BlockType::Record,
        }
    }

    /// Wrap `options` as the payload of an encryptable `block_type`.
    pub fn with_options(block_type: BlockType, options: Sealed<BlockOptions>) -> Option<Self> {
        match block_type {
            BlockType::Zone => Some(SecurePayload::Zone(options)),
            BlockType::Identity => Some(SecurePayload::Identity(options)),
            BlockType::Collection => Some(SecurePayload::Collection(options)),
            BlockType::Options => Some(SecurePayload::Options(options)),
            _ => None,
        }
    }

    pub fn key_payload(&self) -> Option<&KeyPayload> {
        match self {
            SecurePayload::Root(payload) | SecurePayload::Key(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&Sealed<BlockOptions>> {
        match self {
            SecurePayload::Zone(options)
            | SecurePayload::Identity(options)
            | SecurePayload::Collection(options)
            | SecurePayload::Options(options) => Some(options),
            _ => None,
        }
    }
}
