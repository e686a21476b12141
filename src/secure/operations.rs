/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The mutations of the secure blocktree.
//!
//! Every mutation follows the same steps:
//! 1. Find where the new block goes: after the head of the target chain, or as the first block of a
//!    new chain under the target block.
//! 2. [Check the placement](super::validation) against the block type.
//! 3. [Validate the signature](super::signatures) against the keys authorized above that position.
//! 4. Encode the typed payload and write it through the blocktree.
//!
//! A mutation that fails at any step writes nothing.

use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::{
    codec::{payloads::SecureData, PayloadCodec},
    errors::{
        BlocktreeError, InvalidBlockError, InvalidKeyError, InvalidSignatureError,
        SerializationError,
    },
    events::{
        AddKeyEvent, AddOptionsEvent, AddRecordEvent, AddSecretEvent, CreateChildEvent,
        CreateRootEvent, Event, RevokeKeyEvent,
    },
    pluggables::{Cache, Storage, NAME_SCOPE, ROOT_ZONE_SCOPE, SYSTEM_ROOT_SCOPE},
    types::{
        crypto_primitives::CryptoProvider,
        data_types::{CryptoHash, PrivateKeyBytes, PublicKeyBytes, Timestamp},
        keys::Action,
        payloads::{
            BlockOptions, BlockType, EncryptedData, KeyPayload, RecordPayload, Sealed,
            SecretPayload, SecurePayload,
        },
    },
};

use super::{signatures::Signature, SecureBlocktree};

/// Arguments of [`SecureBlocktree::add_key`].
#[derive(TypedBuilder, Debug)]
pub struct AddKey {
    /// Not needed for keys added to the root chain.
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    /// Any block of the chain the key is added to.
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    pub action: Action,
    #[builder(default = Timestamp::ZERO)]
    pub ts_init: Timestamp,
    #[builder(default = Timestamp::MAX)]
    pub ts_exp: Timestamp,
    #[builder(default)]
    pub data: Vec<u8>,
}

/// Arguments of [`SecureBlocktree::revoke_key`].
#[derive(TypedBuilder, Debug)]
pub struct RevokeKey {
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    pub action: Action,
}

/// Arguments of [`SecureBlocktree::add_options`].
#[derive(TypedBuilder, Debug)]
pub struct AddOptions {
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    pub block: CryptoHash,
    #[builder(setter(into))]
    pub options: Sealed<BlockOptions>,
}

/// Arguments of [`SecureBlocktree::add_secret`].
#[derive(TypedBuilder, Debug)]
pub struct AddSecret {
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    #[builder(setter(into))]
    pub reference: String,
    pub secret: Vec<u8>,
    #[builder(default = Timestamp::ZERO)]
    pub ts_init: Timestamp,
    #[builder(default = Timestamp::MAX)]
    pub ts_exp: Timestamp,
}

/// Arguments of [`SecureBlocktree::add_record`].
#[derive(TypedBuilder, Debug)]
pub struct AddRecord {
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    pub block: CryptoHash,
    pub data: Vec<u8>,
}

/// Arguments of [`SecureBlocktree::create_zone`], [`SecureBlocktree::create_identity`], and
/// [`SecureBlocktree::create_collection`].
#[derive(TypedBuilder, Debug)]
pub struct CreateChild {
    #[builder(default, setter(strip_option))]
    pub sig: Option<Signature>,
    /// The block the new chain is nested under.
    #[builder(default, setter(strip_option))]
    pub block: Option<CryptoHash>,
    #[builder(default, setter(into))]
    pub options: Sealed<BlockOptions>,
}

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    /// Create the `root` block, which authorizes `key` for every action, forever.
    ///
    /// # Errors
    ///
    /// [`InvalidRootError`](crate::errors::InvalidRootError) if the store is not empty.
    pub fn create_root(&mut self, key: PublicKeyBytes) -> Result<CryptoHash, BlocktreeError> {
        let data = SecureData {
            sig: None,
            payload: SecurePayload::Root(KeyPayload::root(key.clone())),
        };
        let hash = self.write_secure_block(None, None, &data)?;
        self.blocktree
            .cache()
            .write_global_hash(SYSTEM_ROOT_SCOPE, &hash);

        self.publish(Event::CreateRoot(CreateRootEvent {
            timestamp: SystemTime::now(),
            block: hash,
            key,
        }));
        Ok(hash)
    }

    /// Authorize `args.key` for `args.action` in the chain of `args.block`.
    ///
    /// Keys added to the root chain need no signature and become roots of trust. Elsewhere, the
    /// signing key must be authorized to write above the chain and must itself chain back to a root
    /// of trust.
    ///
    /// # Errors
    ///
    /// - The errors of [`validate_parent_block`](Self::validate_parent_block) and
    ///   [`validate_signature`](Self::validate_signature).
    /// - [`InvalidKeyError::UntrustedParentKey`] if the signing key does not chain back to a root of
    ///   trust.
    pub fn add_key(&mut self, args: AddKey) -> Result<CryptoHash, BlocktreeError> {
        let (hash, parent_key) = self.append_key(
            args.sig.as_ref(),
            &args.block,
            KeyPayload {
                parent_key: None,
                key: args.key.clone(),
                action: args.action,
                ts_init: args.ts_init,
                ts_exp: args.ts_exp,
                data: args.data,
            },
        )?;

        self.publish(Event::AddKey(AddKeyEvent {
            timestamp: SystemTime::now(),
            block: hash,
            key: args.key,
            action: args.action,
            parent_key,
        }));
        Ok(hash)
    }

    /// Append a record that deactivates `args.key` for `args.action` in the chain of `args.block`.
    /// Earlier records of the key stay readable but are no longer active.
    pub fn revoke_key(&mut self, args: RevokeKey) -> Result<CryptoHash, BlocktreeError> {
        let (hash, _) = self.append_key(
            args.sig.as_ref(),
            &args.block,
            KeyPayload {
                parent_key: None,
                key: args.key.clone(),
                action: args.action,
                ts_init: Timestamp::ZERO,
                ts_exp: Timestamp::ZERO,
                data: Vec::new(),
            },
        )?;

        self.publish(Event::RevokeKey(RevokeKeyEvent {
            timestamp: SystemTime::now(),
            block: hash,
            key: args.key,
            action: args.action,
        }));
        Ok(hash)
    }

    // Append `payload` to the chain of `block`, filling in its parent key from the signature.
    fn append_key(
        &mut self,
        sig: Option<&Signature>,
        block: &CryptoHash,
        mut payload: KeyPayload,
    ) -> Result<(CryptoHash, Option<PublicKeyBytes>), BlocktreeError> {
        let prev = self.blocktree.get_head_block(block)?;
        let chain_root = self.blocktree.get_root_block(block)?;

        if self.get_system_root() == Some(chain_root) {
            let data = SecureData {
                sig: None,
                payload: SecurePayload::Key(payload),
            };
            let hash = self.write_secure_block(Some(&prev), None, &data)?;
            return Ok((hash, None));
        }

        let parent = self.validate_parent_block(Some(&prev), None, BlockType::Key)?;
        let sig = sig.ok_or(InvalidSignatureError::NotFound { key: None })?;
        let (sig, encoded) =
            self.validate_signature(sig, parent.as_ref(), Some(&prev), Action::Write, true)?;

        let trusted = match &parent {
            Some(parent) => {
                self.validate_parent_key(parent, &encoded.key, Timestamp::now(), true)?
            }
            None => false,
        };
        if !trusted {
            log::debug!("Rejected key: signer {} is not trusted", encoded.key);
            return Err(InvalidKeyError::UntrustedParentKey {
                key: encoded.key,
                block: parent.unwrap_or(chain_root),
            }
            .into());
        }

        payload.parent_key = Some(encoded.key.clone());
        let data = SecureData {
            sig: Some(sig),
            payload: SecurePayload::Key(payload),
        };
        let hash = self.write_secure_block(Some(&prev), parent.as_ref(), &data)?;
        Ok((hash, Some(encoded.key)))
    }

    /// Append an `options` block to the chain of `args.block`.
    pub fn add_options(&mut self, args: AddOptions) -> Result<CryptoHash, BlocktreeError> {
        let is_encrypted = args.options.is_encrypted();
        let hash = self.append_signed(
            args.sig.as_ref(),
            &args.block,
            SecurePayload::Options(args.options),
            true,
        )?;

        self.publish(Event::AddOptions(AddOptionsEvent {
            timestamp: SystemTime::now(),
            block: hash,
            is_encrypted,
        }));
        Ok(hash)
    }

    /// Append a `secret` block to the chain of `args.block`. The signer may be authorized in that
    /// chain itself.
    pub fn add_secret(&mut self, args: AddSecret) -> Result<CryptoHash, BlocktreeError> {
        let payload = SecretPayload {
            key: args.key.clone(),
            reference: args.reference.clone(),
            secret: args.secret,
            ts_init: args.ts_init,
            ts_exp: args.ts_exp,
        };
        let hash = self.append_signed(
            args.sig.as_ref(),
            &args.block,
            SecurePayload::Secret(payload),
            false,
        )?;

        self.publish(Event::AddSecret(AddSecretEvent {
            timestamp: SystemTime::now(),
            block: hash,
            key: args.key,
            reference: args.reference,
        }));
        Ok(hash)
    }

    /// Append a `record` block to the collection of `args.block`. The signer may be authorized in
    /// the collection itself.
    pub fn add_record(&mut self, args: AddRecord) -> Result<CryptoHash, BlocktreeError> {
        let len = args.data.len();
        let hash = self.append_signed(
            args.sig.as_ref(),
            &args.block,
            SecurePayload::Record(RecordPayload { data: args.data }),
            false,
        )?;

        self.publish(Event::AddRecord(AddRecordEvent {
            timestamp: SystemTime::now(),
            block: hash,
            len,
        }));
        Ok(hash)
    }

    fn append_signed(
        &mut self,
        sig: Option<&Signature>,
        block: &CryptoHash,
        payload: SecurePayload,
        require_parent: bool,
    ) -> Result<CryptoHash, BlocktreeError> {
        let prev = self.blocktree.get_head_block(block)?;
        let parent = self.validate_parent_block(Some(&prev), None, payload.block_type())?;
        let sig = sig.ok_or(InvalidSignatureError::NotFound { key: None })?;
        let (sig, _) = self.validate_signature(
            sig,
            parent.as_ref(),
            Some(&prev),
            Action::Write,
            require_parent,
        )?;

        let data = SecureData {
            sig: Some(sig),
            payload,
        };
        self.write_secure_block(Some(&prev), parent.as_ref(), &data)
    }

    /// Create a zone chain under `args.block`. The first zone created under the root chain becomes
    /// the root zone.
    pub fn create_zone(&mut self, args: CreateChild) -> Result<CryptoHash, BlocktreeError> {
        self.create_child(args, BlockType::Zone)
    }

    /// Create an identity chain under the zone of `args.block`.
    pub fn create_identity(&mut self, args: CreateChild) -> Result<CryptoHash, BlocktreeError> {
        self.create_child(args, BlockType::Identity)
    }

    /// Create a collection chain under the zone of `args.block`.
    pub fn create_collection(&mut self, args: CreateChild) -> Result<CryptoHash, BlocktreeError> {
        self.create_child(args, BlockType::Collection)
    }

    fn create_child(
        &mut self,
        args: CreateChild,
        block_type: BlockType,
    ) -> Result<CryptoHash, BlocktreeError> {
        let sig = args
            .sig
            .ok_or(InvalidSignatureError::NotFound { key: None })?;
        let block = args.block.ok_or(InvalidBlockError::NotFound { block: None })?;

        let parent = self
            .validate_parent_block(None, Some(&block), block_type)?
            .unwrap_or(block);
        let (sig, _) = self.validate_signature(&sig, Some(&parent), None, Action::Write, true)?;

        let name = args
            .options
            .plain()
            .and_then(|options| options.get("name"))
            .map(str::to_string);
        let payload = SecurePayload::with_options(block_type, args.options)
            .ok_or(SerializationError::InvalidEncoding { field: "type" })?;
        let data = SecureData {
            sig: Some(sig),
            payload,
        };
        let hash = self.write_secure_block(None, Some(&parent), &data)?;

        let cache = self.blocktree.cache();
        if let Some(name) = name {
            cache.write_cache(Some(NAME_SCOPE), &hash.bytes(), name.as_bytes());
        }
        if block_type == BlockType::Zone
            && self.get_system_root() == Some(self.blocktree.get_root_block(&parent)?)
        {
            cache.write_global_hash(ROOT_ZONE_SCOPE, &hash);
        }

        self.publish(Event::CreateChild(CreateChildEvent {
            timestamp: SystemTime::now(),
            block: hash,
            block_type,
            parent,
        }));
        Ok(hash)
    }

    /* ↓↓↓ Encrypted options ↓↓↓ */

    /// Encrypt `options` for `key`, for use as the payload of a `block_type` block.
    pub fn encrypt_block_data(
        &self,
        key: &PublicKeyBytes,
        block_type: BlockType,
        options: &BlockOptions,
    ) -> Result<EncryptedData, BlocktreeError> {
        if !block_type.is_encryptable() {
            return Err(SerializationError::InvalidEncoding { field: "type" }.into());
        }
        let plaintext = options.serialize()?;
        let encrypted_data = self.crypto.encrypt(key, &plaintext)?;
        Ok(EncryptedData {
            key: key.clone(),
            encrypted_data,
        })
    }

    /// Decode the options in `envelope`, decrypting them with `private_key` if one is given.
    /// Without a private key, the envelope is expected to hold plaintext options, as returned to a
    /// trusted reader after decryption.
    pub fn decrypt_block_data(
        &self,
        envelope: &EncryptedData,
        block_type: BlockType,
        private_key: Option<&PrivateKeyBytes>,
    ) -> Result<BlockOptions, BlocktreeError> {
        if !block_type.is_encryptable() {
            return Err(SerializationError::InvalidEncoding { field: "type" }.into());
        }
        let plaintext = match private_key {
            Some(private_key) => self.crypto.decrypt(private_key, &envelope.encrypted_data)?,
            None => envelope.encrypted_data.clone(),
        };
        let (options, _) = BlockOptions::deserialize(&plaintext, 0)?;
        Ok(options)
    }
}
