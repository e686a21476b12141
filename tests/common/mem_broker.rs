//! An in-process implementation of [`Broker`] that holds authorized keys in memory.

use std::{cell::Cell, collections::HashMap};

use blocktree::{
    broker::{reencrypt_secrets, Broker, BuildTrustedSecrets},
    errors::BrokerError,
    types::{
        crypto_primitives::Ed25519Crypto,
        data_types::{PrivateKeyBytes, PublicKeyBytes},
    },
};

pub(crate) struct MemBroker {
    crypto: Ed25519Crypto,
    authorized_keys: HashMap<PublicKeyBytes, PrivateKeyBytes>,
    requests: Cell<usize>,
}

impl MemBroker {
    pub(crate) fn new() -> MemBroker {
        MemBroker {
            crypto: Ed25519Crypto::new(),
            authorized_keys: HashMap::new(),
            requests: Cell::new(0),
        }
    }

    /// Number of times `build_trusted_secrets` was called.
    pub(crate) fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl Broker for MemBroker {
    fn add_authorized_key(
        &mut self,
        public_key: PublicKeyBytes,
        private_key: PrivateKeyBytes,
    ) -> Result<(), BrokerError> {
        self.authorized_keys.insert(public_key, private_key);
        Ok(())
    }

    fn revoke_authorized_key(&mut self, public_key: &PublicKeyBytes) -> Result<(), BrokerError> {
        self.authorized_keys
            .remove(public_key)
            .map(|_| ())
            .ok_or(BrokerError::UnknownAuthorizedKey {
                key: public_key.clone(),
            })
    }

    fn build_trusted_secrets(
        &self,
        request: &BuildTrustedSecrets,
    ) -> Result<Vec<Vec<u8>>, BrokerError> {
        self.requests.set(self.requests.get() + 1);
        let private_key = self.authorized_keys.get(&request.authorized_key).ok_or(
            BrokerError::UnknownAuthorizedKey {
                key: request.authorized_key.clone(),
            },
        )?;
        reencrypt_secrets(&self.crypto, private_key, request)
    }
}
