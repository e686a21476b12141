/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Block signatures and their validation against the key hierarchy.
//!
//! ## Encoding
//!
//! A block's signature is stored as:
//!
//! ```text
//! index (8) || varbinary(public key) || nonce (8) || signature
//! ```
//!
//! where `index` is the number of blocks in the store at signing time, `nonce` is 8 random bytes, and
//! `signature` signs `index || nonce || parent || prev` (with absent hashes written as 32 zero
//! bytes). The signed `prev` and `parent` tie a signature to one position in the tree, and the
//! nonce lets [`write_secure_block`](super::SecureBlocktree) reject a signature copied onto a
//! sibling chain.

use std::fmt::{self, Debug, Formatter};

use crate::{
    codec::{PayloadCodec, Reader, Writer},
    errors::{BlocktreeError, CryptoError, InvalidSignatureError, SerializationError},
    pluggables::{Cache, Storage},
    types::{
        crypto_primitives::CryptoProvider,
        data_types::{CryptoHash, PrivateKeyBytes, PublicKeyBytes, Timestamp},
        keys::Action,
    },
};

use super::SecureBlocktree;

pub const SIGNATURE_NONCE_LEN: usize = 8;

/// What a signer signs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureRequest {
    pub index: u64,
    pub nonce: [u8; SIGNATURE_NONCE_LEN],
    pub parent: Option<CryptoHash>,
    pub prev: Option<CryptoHash>,
}

impl SignatureRequest {
    /// The bytes that are signed.
    pub fn message(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.u64(self.index);
        writer.raw(&self.nonce);
        writer.hash(self.parent.as_ref());
        writer.hash(self.prev.as_ref());
        writer.into_bytes()
    }
}

/// A decoded block signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedSignature {
    pub index: u64,
    pub key: PublicKeyBytes,
    pub nonce: [u8; SIGNATURE_NONCE_LEN],
    pub signature: Vec<u8>,
}

impl EncodedSignature {
    /// The request this signature claims to sign, for a block placed at `parent` and `prev`.
    pub fn request(
        &self,
        parent: Option<&CryptoHash>,
        prev: Option<&CryptoHash>,
    ) -> SignatureRequest {
        SignatureRequest {
            index: self.index,
            nonce: self.nonce,
            parent: parent.copied(),
            prev: prev.copied(),
        }
    }
}

impl PayloadCodec for EncodedSignature {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        writer.u64(self.index);
        writer.var_binary("signature key", self.key.bytes())?;
        writer.raw(&self.nonce);
        writer.raw(&self.signature);
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let index = reader.u64("signature index")?;
        let key = PublicKeyBytes::from(reader.var_binary("signature key")?);
        let nonce = reader.fixed("signature nonce")?;
        let signature = reader.remaining().to_vec();
        Ok(EncodedSignature {
            index,
            key,
            nonce,
            signature,
        })
    }
}

/// Produces an encoded signature for a [`SignatureRequest`].
pub type SignFn = Box<dyn Fn(&SignatureRequest) -> Result<Vec<u8>, CryptoError> + Send>;

/// The signature that authorizes a mutation.
pub enum Signature {
    /// An already-encoded signature.
    Eager(Vec<u8>),
    /// A signer that is called once the position and index of the new block are known.
    Deferred(SignFn),
}

impl Signature {
    /// A deferred signature that signs with `private_key`.
    pub fn from_keypair<P: CryptoProvider>(crypto: P, private_key: PrivateKeyBytes) -> Signature {
        Signature::Deferred(Box::new(move |request| {
            sign_block(&crypto, &private_key, request)
        }))
    }

    fn resolve(&self, request: &SignatureRequest) -> Result<Vec<u8>, CryptoError> {
        match self {
            Signature::Eager(bytes) => Ok(bytes.clone()),
            Signature::Deferred(sign) => sign(request),
        }
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Eager(bytes) => f.debug_tuple("Eager").field(bytes).finish(),
            Signature::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Sign `request` with `private_key` and encode the result.
pub fn sign_block<P: CryptoProvider>(
    crypto: &P,
    private_key: &PrivateKeyBytes,
    request: &SignatureRequest,
) -> Result<Vec<u8>, CryptoError> {
    let key = crypto.public_key(private_key)?;
    let signature = crypto.sign(private_key, &request.message())?;
    EncodedSignature {
        index: request.index,
        key,
        nonce: request.nonce,
        signature,
    }
    .serialize()
    .map_err(|_| CryptoError::InvalidPublicKey)
}

/// Whether `signature` signs the request of a block placed at `parent` and `prev`.
pub fn verify_signed_block<P: CryptoProvider>(
    crypto: &P,
    signature: &EncodedSignature,
    parent: Option<&CryptoHash>,
    prev: Option<&CryptoHash>,
) -> bool {
    let message = signature.request(parent, prev).message();
    crypto.verify(&signature.key, &message, &signature.signature)
}

impl<S: Storage, C: Cache, P: CryptoProvider> SecureBlocktree<S, C, P> {
    /// Validate `sig` for a block to be placed at `parent` and `prev`, returning the encoded
    /// signature bytes and their decoded form.
    ///
    /// The signing key must be presently authorized for `action` in the chain of `parent` or one of
    /// its ancestors. If `require_parent` is `false`, the chain of `prev` (falling back to `parent`)
    /// is searched instead.
    ///
    /// # Errors
    ///
    /// - [`InvalidSignatureError::NotFound`] if the key is not authorized.
    /// - [`InvalidSignatureError::DoesNotMatch`] if the key is authorized but the signature does not
    ///   verify.
    pub fn validate_signature(
        &self,
        sig: &Signature,
        parent: Option<&CryptoHash>,
        prev: Option<&CryptoHash>,
        action: Action,
        require_parent: bool,
    ) -> Result<(Vec<u8>, EncodedSignature), BlocktreeError> {
        let scan_block = if require_parent {
            parent
        } else {
            prev.or(parent)
        };

        let mut nonce = [0u8; SIGNATURE_NONCE_LEN];
        for (byte, random) in nonce
            .iter_mut()
            .zip(self.crypto.random_bytes(SIGNATURE_NONCE_LEN))
        {
            *byte = random;
        }
        let request = SignatureRequest {
            index: self.blocktree.count_blocks(),
            nonce,
            parent: parent.copied(),
            prev: prev.copied(),
        };
        let bytes = sig.resolve(&request)?;
        let (encoded, _) = EncodedSignature::deserialize(&bytes, 0)?;

        let authorized = match scan_block {
            Some(scan_block) => self
                .perform_key_seek(scan_block, action, &encoded.key, Timestamp::now())?
                .is_some(),
            None => false,
        };
        if !authorized {
            log::debug!(
                "Rejected signature: key {} is not authorized to {}",
                encoded.key,
                action
            );
            return Err(InvalidSignatureError::NotFound {
                key: Some(encoded.key),
            }
            .into());
        }

        if !verify_signed_block(&self.crypto, &encoded, parent, prev) {
            log::debug!("Rejected signature: does not verify under key {}", encoded.key);
            return Err(InvalidSignatureError::DoesNotMatch { key: encoded.key }.into());
        }

        Ok((bytes, encoded))
    }
}
