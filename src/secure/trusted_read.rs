/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Privilege elevation: reading encrypted block data with a key other than the one it was encrypted
//! for.
//!
//! A *trusted* key proves possession by signing a caller-chosen token. If both the trusted key and
//! the *authorized* key that the data was encrypted for may presently read the block, a
//! [`Broker`] holding the authorized private key re-encrypts the data for the trusted key.

use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::{
    broker::{Broker, BuildTrustedSecrets},
    errors::{BlocktreeError, BrokerError, InvalidKeyError, InvalidSignatureError},
    events::{Event, TrustedReadEvent},
    pluggables::{Cache, Storage},
    types::{
        block::SecureBlock,
        crypto_primitives::CryptoProvider,
        data_types::{CryptoHash, PublicKeyBytes, Timestamp},
        keys::Action,
        payloads::{EncryptedData, Sealed},
    },
};

use super::SecureBlocktree;

/// Arguments of [`SecureBlocktree::perform_trusted_read`].
#[derive(TypedBuilder, Clone, Debug)]
pub struct TrustedRead {
    pub block: CryptoHash,
    /// The trusted key to read as.
    pub key: PublicKeyBytes,
    #[builder(default)]
    pub token: Vec<u8>,
    /// Signature over `token` under `key`. Not needed if `key` is the key the data is encrypted for.
    #[builder(default, setter(strip_option))]
    pub sig: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrustedReadResult {
    /// The block's data is not encrypted.
    Plain(SecureBlock),
    /// The block's data is encrypted for the reading key already, and is returned as stored.
    Encrypted(EncryptedData),
    /// The block's data, re-encrypted for the reading key by the broker.
    Reencrypted(EncryptedData),
}

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    /// Read `args.block` as `args.key`.
    ///
    /// # Errors
    ///
    /// If the data has to be re-encrypted:
    /// - [`InvalidSignatureError::NotFound`] if no token signature is given, and
    ///   [`InvalidSignatureError::DoesNotMatch`] if it does not verify under `args.key`.
    /// - [`InvalidKeyError::NotTrusted`] if `args.key` may not read the block.
    /// - [`InvalidKeyError::NotAuthorized`] if the key the data is encrypted for may no longer read
    ///   the block.
    /// - [`BrokerError`] if the broker fails or returns nothing.
    pub fn perform_trusted_read<B: Broker>(
        &self,
        args: &TrustedRead,
        broker: &B,
    ) -> Result<TrustedReadResult, BlocktreeError> {
        let block = self.read_secure_block(&args.block)?;
        let Some(envelope) = block.payload.options().and_then(Sealed::encrypted).cloned() else {
            self.publish_trusted_read(args, false);
            return Ok(TrustedReadResult::Plain(block));
        };

        if envelope.key == args.key {
            self.publish_trusted_read(args, false);
            return Ok(TrustedReadResult::Encrypted(envelope));
        }

        let sig = args.sig.as_ref().ok_or(InvalidSignatureError::NotFound {
            key: Some(args.key.clone()),
        })?;
        if !self.crypto.verify(&args.key, &args.token, sig) {
            log::debug!("Rejected trusted read: token signature does not verify");
            return Err(InvalidSignatureError::DoesNotMatch {
                key: args.key.clone(),
            }
            .into());
        }

        let now = Timestamp::now();
        if self
            .perform_key_seek(&args.block, Action::Read, &args.key, now)?
            .is_none()
        {
            log::debug!("Rejected trusted read: {} may not read {}", args.key, args.block);
            return Err(InvalidKeyError::NotTrusted {
                key: args.key.clone(),
                block: args.block,
            }
            .into());
        }
        if self
            .perform_key_seek(&args.block, Action::Read, &envelope.key, now)?
            .is_none()
        {
            log::debug!(
                "Rejected trusted read: {} may no longer read {}",
                envelope.key,
                args.block
            );
            return Err(InvalidKeyError::NotAuthorized {
                key: envelope.key,
                block: args.block,
            }
            .into());
        }

        let request = BuildTrustedSecrets {
            token: args.token.clone(),
            sig: sig.clone(),
            secrets: vec![envelope.encrypted_data],
            authorized_key: envelope.key,
            trusted_key: args.key.clone(),
        };
        let encrypted_data = broker
            .build_trusted_secrets(&request)?
            .into_iter()
            .next()
            .ok_or(BrokerError::EmptyResponse)?;

        self.publish_trusted_read(args, true);
        Ok(TrustedReadResult::Reencrypted(EncryptedData {
            key: args.key.clone(),
            encrypted_data,
        }))
    }

    fn publish_trusted_read(&self, args: &TrustedRead, brokered: bool) {
        self.publish(Event::TrustedRead(TrustedReadEvent {
            timestamp: SystemTime::now(),
            block: args.block,
            trusted_key: args.key.clone(),
            brokered,
        }));
    }
}
