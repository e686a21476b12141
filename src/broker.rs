/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The secrets broker contract.
//!
//! A broker holds the private keys that data in the blocktree is encrypted for (the *authorized*
//! keys), and re-encrypts that data for another key (the *trusted* key) on request. It is the only
//! component that ever holds an authorized private key: the
//! [trusted read](crate::secure::SecureBlocktree::perform_trusted_read) only hands it ciphertexts
//! and public keys, after checking that both keys are authorized to read the block.
//!
//! How a broker is reached (in-process, over HTTP, ...) is up to the implementor.
//! [`reencrypt_secrets`] implements the cryptographic half of the contract for brokers that hold the
//! authorized keys locally.

use crate::{
    errors::BrokerError,
    types::{
        crypto_primitives::CryptoProvider,
        data_types::{PrivateKeyBytes, PublicKeyBytes},
    },
};

/// A request to re-encrypt `secrets` from `authorized_key` to `trusted_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildTrustedSecrets {
    /// Caller-chosen challenge.
    pub token: Vec<u8>,
    /// Signature over `token` under `trusted_key`.
    pub sig: Vec<u8>,
    /// Ciphertexts encrypted for `authorized_key`.
    pub secrets: Vec<Vec<u8>>,
    pub authorized_key: PublicKeyBytes,
    pub trusted_key: PublicKeyBytes,
}

pub trait Broker {
    fn add_authorized_key(
        &mut self,
        public_key: PublicKeyBytes,
        private_key: PrivateKeyBytes,
    ) -> Result<(), BrokerError>;

    fn revoke_authorized_key(&mut self, public_key: &PublicKeyBytes) -> Result<(), BrokerError>;

    /// Re-encrypt every secret in `request` for its trusted key, in order.
    fn build_trusted_secrets(
        &self,
        request: &BuildTrustedSecrets,
    ) -> Result<Vec<Vec<u8>>, BrokerError>;
}

/// Verify the token signature of `request`, then decrypt each secret with
/// `authorized_private_key` and encrypt it again for the trusted key.
pub fn reencrypt_secrets<P: CryptoProvider>(
    crypto: &P,
    authorized_private_key: &PrivateKeyBytes,
    request: &BuildTrustedSecrets,
) -> Result<Vec<Vec<u8>>, BrokerError> {
    if !crypto.verify(&request.trusted_key, &request.token, &request.sig) {
        return Err(BrokerError::Rejected {
            reason: format!("token signature does not verify under {}", request.trusted_key),
        });
    }

    request
        .secrets
        .iter()
        .map(|secret| {
            let plaintext = crypto.decrypt(authorized_private_key, secret)?;
            Ok(crypto.encrypt(&request.trusted_key, &plaintext)?)
        })
        .collect()
}
