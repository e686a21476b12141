/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The blocktree only ever talks to cryptography through the [`CryptoProvider`] capability trait.
//! The provided implementation, [`Ed25519Crypto`], is assembled from:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate.
//! 3. **Asymmetric Encryption**: an ephemeral X25519 key agreement ([`x25519_dalek`]) against the
//!    recipient's Ed25519 key mapped onto Curve25519, followed by AES-256-GCM ([`aes_gcm`]) under a
//!    SHA256-derived key. One Ed25519 key pair therefore serves for both signing and decryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand_core::{OsRng, RngCore};

use crate::errors::CryptoError;

use super::data_types::{CryptoHash, PrivateKeyBytes, PublicKeyBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// Domain separator mixed into every envelope key derivation.
const ENVELOPE_KDF_DOMAIN: &[u8] = b"blocktree-envelope-v1";

const X25519_PUBLIC_KEY_LEN: usize = 32;
const AES_GCM_NONCE_LEN: usize = 12;

/// Hash `bytes` with SHA256.
pub fn sha256(bytes: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(bytes);
    CryptoHash::new(hasher.finalize().into())
}

/// Capabilities the blocktree needs from a cryptography backend.
///
/// Keys are passed around as opaque bytes so that the key hierarchy does not depend on a particular
/// signature or encryption scheme.
pub trait CryptoProvider: Clone + Send + 'static {
    fn hash(&self, bytes: &[u8]) -> CryptoHash {
        sha256(bytes)
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    /// Derive the public key that belongs to `private_key`.
    fn public_key(&self, private_key: &PrivateKeyBytes) -> Result<PublicKeyBytes, CryptoError>;

    fn sign(&self, private_key: &PrivateKeyBytes, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Returns `false` both for signatures that do not verify and for malformed keys or signatures.
    fn verify(&self, public_key: &PublicKeyBytes, message: &[u8], signature: &[u8]) -> bool;

    fn encrypt(&self, public_key: &PublicKeyBytes, plaintext: &[u8])
        -> Result<Vec<u8>, CryptoError>;

    fn decrypt(
        &self,
        private_key: &PrivateKeyBytes,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// [`CryptoProvider`] backed by Ed25519 key pairs.
///
/// Ciphertexts have the layout `ephemeral public key (32) || nonce (12) || AES-GCM ciphertext`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Crypto;

impl Ed25519Crypto {
    pub fn new() -> Self {
        Ed25519Crypto
    }

    fn signing_key(private_key: &PrivateKeyBytes) -> Result<SigningKey, CryptoError> {
        let bytes: [u8; 32] = private_key
            .bytes()
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(SigningKey::from_bytes(&bytes))
    }

    fn verifying_key(public_key: &PublicKeyBytes) -> Result<VerifyingKey, CryptoError> {
        let bytes: [u8; 32] = public_key
            .bytes()
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
    }

    fn envelope_key(
        shared_secret: &[u8],
        ephemeral_public: &[u8],
        recipient_public: &[u8],
    ) -> Key<Aes256Gcm> {
        let mut hasher = CryptoHasher::new();
        hasher.update(ENVELOPE_KDF_DOMAIN);
        hasher.update(shared_secret);
        hasher.update(ephemeral_public);
        hasher.update(recipient_public);
        let okm: [u8; 32] = hasher.finalize().into();
        Key::<Aes256Gcm>::from(okm)
    }
}

impl CryptoProvider for Ed25519Crypto {
    fn public_key(&self, private_key: &PrivateKeyBytes) -> Result<PublicKeyBytes, CryptoError> {
        let signing_key = Self::signing_key(private_key)?;
        Ok(PublicKeyBytes::new(
            signing_key.verifying_key().to_bytes().to_vec(),
        ))
    }

    fn sign(&self, private_key: &PrivateKeyBytes, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signing_key = Self::signing_key(private_key)?;
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, public_key: &PublicKeyBytes, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = Self::verifying_key(public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }

    fn encrypt(
        &self,
        public_key: &PublicKeyBytes,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let recipient = x25519_dalek::PublicKey::from(
            Self::verifying_key(public_key)?.to_montgomery().to_bytes(),
        );
        let ephemeral_secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral_secret);
        let shared_secret = ephemeral_secret.diffie_hellman(&recipient);

        let key = Self::envelope_key(
            shared_secret.as_bytes(),
            ephemeral_public.as_bytes(),
            recipient.as_bytes(),
        );
        let mut nonce = [0u8; AES_GCM_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = Aes256Gcm::new(&key)
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut envelope =
            Vec::with_capacity(X25519_PUBLIC_KEY_LEN + AES_GCM_NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(ephemeral_public.as_bytes());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    fn decrypt(
        &self,
        private_key: &PrivateKeyBytes,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < X25519_PUBLIC_KEY_LEN + AES_GCM_NONCE_LEN {
            return Err(CryptoError::MalformedCiphertext);
        }
        let (ephemeral_public, rest) = ciphertext.split_at(X25519_PUBLIC_KEY_LEN);
        let (nonce, body) = rest.split_at(AES_GCM_NONCE_LEN);
        let ephemeral_public: [u8; 32] = ephemeral_public
            .try_into()
            .map_err(|_| CryptoError::MalformedCiphertext)?;
        let ephemeral_public = x25519_dalek::PublicKey::from(ephemeral_public);

        let signing_key = Self::signing_key(private_key)?;
        let secret = x25519_dalek::StaticSecret::from(signing_key.to_scalar_bytes());
        let recipient = x25519_dalek::PublicKey::from(
            signing_key.verifying_key().to_montgomery().to_bytes(),
        );
        let shared_secret = secret.diffie_hellman(&ephemeral_public);

        let key = Self::envelope_key(
            shared_secret.as_bytes(),
            ephemeral_public.as_bytes(),
            recipient.as_bytes(),
        );
        Aes256Gcm::new(&key)
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}
