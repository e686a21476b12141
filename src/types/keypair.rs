/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [Keypair] type: an Ed25519 signing key held as the opaque bytes that the key
//! hierarchy and [`CryptoProvider`](super::crypto_primitives::CryptoProvider) work with.

use rand_core::OsRng;

use super::{
    crypto_primitives::SigningKey,
    data_types::{PrivateKeyBytes, PublicKeyBytes},
};

#[derive(Clone, Debug)]
pub struct Keypair {
    private_key: PrivateKeyBytes,
    public_key: PublicKeyBytes,
}

impl Keypair {
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair {
            private_key: PrivateKeyBytes::new(signing_key.to_bytes().to_vec()),
            public_key: PublicKeyBytes::new(signing_key.verifying_key().to_bytes().to_vec()),
        }
    }

    /// Generate a fresh key pair from the operating system's CSPRNG.
    pub fn generate() -> Keypair {
        Keypair::new(SigningKey::generate(&mut OsRng))
    }

    pub fn private_key(&self) -> &PrivateKeyBytes {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKeyBytes {
        &self.public_key
    }
}
