/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-[`BlockType`] payload codecs, and the encoding of a secure block's data.
//!
//! # Secure block data
//!
//! The data of every secure block is laid out as:
//!
//! ```text
//! type (1) || sig-length (2) || sig || typed payload
//! ```
//!
//! A zero `sig-length` means the block is unsigned (only the root block, and keys bootstrapped
//! directly into the root chain, are unsigned).
//!
//! # Typed payloads
//!
//! |Type|Payload|
//! |---|---|
//! |`root`, `key`|`varbinary(parent_key) \|\| varbinary(key) \|\| byte(action) \|\| int64(ts_init) \|\| int64(ts_exp) \|\| remaining(data)`|
//! |`zone`, `identity`, `collection`, `options`|`byte(is_encrypted)`, then either the options encoding or `varbinary(key) \|\| remaining(encrypted_data)`|
//! |`secret`|`varbinary(key) \|\| varbinary(reference) \|\| int64(ts_init) \|\| int64(ts_exp) \|\| remaining(secret)`|
//! |`record`|`remaining(data)`|
//!
//! The options encoding is `byte(count)` followed by `count` pairs of
//! `byte(key_len) || key || byte(value_len) || value`.

use crate::{
    errors::SerializationError,
    types::{
        data_types::{PublicKeyBytes, Timestamp},
        keys::Action,
        payloads::{
            BlockOptions, BlockType, EncryptedData, KeyPayload, RecordPayload, Sealed,
            SecretPayload, SecurePayload,
        },
    },
};

use super::{PayloadCodec, Reader, Writer};

const PLAINTEXT: u8 = 0;
const ENCRYPTED: u8 = 1;

impl PayloadCodec for KeyPayload {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        let parent_key = self
            .parent_key
            .as_ref()
            .map(PublicKeyBytes::bytes)
            .unwrap_or(&[]);
        writer.var_binary("parent key", parent_key)?;
        writer.var_binary("key", self.key.bytes())?;
        writer.u8(self.action.to_byte());
        writer.i64(self.ts_init.int());
        writer.i64(self.ts_exp.int());
        writer.raw(&self.data);
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let parent_key = reader.var_binary("parent key")?;
        let key = reader.var_binary("key")?;
        let action = Action::from_byte(reader.u8("action")?)
            .ok_or(SerializationError::InvalidEncoding { field: "action" })?;
        let ts_init = Timestamp::new(reader.i64("ts init")?);
        let ts_exp = Timestamp::new(reader.i64("ts exp")?);
        let data = reader.remaining().to_vec();

        Ok(KeyPayload {
            parent_key: if parent_key.is_empty() {
                None
            } else {
                Some(PublicKeyBytes::from(parent_key))
            },
            key: PublicKeyBytes::from(key),
            action,
            ts_init,
            ts_exp,
            data,
        })
    }
}

impl PayloadCodec for BlockOptions {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        let count = u8::try_from(self.len())
            .map_err(|_| SerializationError::ArgumentOutOfBounds { field: "options" })?;
        writer.u8(count);
        for (key, value) in self.iter() {
            writer.short_binary("option key", key.as_bytes())?;
            writer.short_binary("option value", value.as_bytes())?;
        }
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let count = reader.u8("options")?;
        let mut options = BlockOptions::new();
        for _ in 0..count {
            let key = reader.short_string("option key")?;
            let value = reader.short_string("option value")?;
            options.insert(key, value);
        }
        Ok(options)
    }
}

impl<T: PayloadCodec> PayloadCodec for Sealed<T> {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        match self {
            Sealed::Plain(payload) => {
                writer.u8(PLAINTEXT);
                payload.write(writer)
            }
            Sealed::Encrypted(envelope) => {
                writer.u8(ENCRYPTED);
                writer.var_binary("encryption key", envelope.key.bytes())?;
                writer.raw(&envelope.encrypted_data);
                Ok(())
            }
        }
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        match reader.u8("is encrypted")? {
            PLAINTEXT => Ok(Sealed::Plain(T::read(reader)?)),
            ENCRYPTED => {
                let key = PublicKeyBytes::from(reader.var_binary("encryption key")?);
                let encrypted_data = reader.remaining().to_vec();
                Ok(Sealed::Encrypted(EncryptedData {
                    key,
                    encrypted_data,
                }))
            }
            _ => Err(SerializationError::InvalidEncoding {
                field: "is encrypted",
            }),
        }
    }
}

impl PayloadCodec for SecretPayload {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        writer.var_binary("key", self.key.bytes())?;
        writer.var_binary("reference", self.reference.as_bytes())?;
        writer.i64(self.ts_init.int());
        writer.i64(self.ts_exp.int());
        writer.raw(&self.secret);
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let key = PublicKeyBytes::from(reader.var_binary("key")?);
        let reference = String::from_utf8(reader.var_binary("reference")?.to_vec())
            .map_err(|_| SerializationError::InvalidEncoding { field: "reference" })?;
        let ts_init = Timestamp::new(reader.i64("ts init")?);
        let ts_exp = Timestamp::new(reader.i64("ts exp")?);
        let secret = reader.remaining().to_vec();
        Ok(SecretPayload {
            key,
            reference,
            secret,
            ts_init,
            ts_exp,
        })
    }
}

impl PayloadCodec for RecordPayload {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        writer.raw(&self.data);
        Ok(())
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(RecordPayload {
            data: reader.remaining().to_vec(),
        })
    }
}

impl SecurePayload {
    pub fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        match self {
            SecurePayload::Root(payload) | SecurePayload::Key(payload) => payload.write(writer),
            SecurePayload::Zone(options)
            | SecurePayload::Identity(options)
            | SecurePayload::Collection(options)
            | SecurePayload::Options(options) => options.write(writer),
            SecurePayload::Secret(payload) => payload.write(writer),
            SecurePayload::Record(payload) => payload.write(writer),
        }
    }

    /// Read the payload of a block of type `block_type`.
    pub fn read(
        block_type: BlockType,
        reader: &mut Reader<'_>,
    ) -> Result<SecurePayload, SerializationError> {
        Ok(match block_type {
            BlockType::Root => SecurePayload::Root(KeyPayload::read(reader)?),
            BlockType::Key => SecurePayload::Key(KeyPayload::read(reader)?),
            BlockType::Zone => SecurePayload::Zone(Sealed::read(reader)?),
            BlockType::Identity => SecurePayload::Identity(Sealed::read(reader)?),
            BlockType::Collection => SecurePayload::Collection(Sealed::read(reader)?),
            BlockType::Options => SecurePayload::Options(Sealed::read(reader)?),
            BlockType::Secret => SecurePayload::Secret(SecretPayload::read(reader)?),
            BlockType::Record => SecurePayload::Record(RecordPayload::read(reader)?),
        })
    }
}

/// The data of a secure block: its signature (if any) and its typed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureData {
    pub sig: Option<Vec<u8>>,
    pub payload: SecurePayload,
}

impl SecureData {
    pub fn block_type(&self) -> BlockType {
        self.payload.block_type()
    }
}

impl PayloadCodec for SecureData {
    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError> {
        writer.u8(self.block_type().to_byte());
        writer.var_binary("sig", self.sig.as_deref().unwrap_or(&[]))?;
        self.payload.write(writer)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let block_type = BlockType::from_byte(reader.u8("type")?)
            .ok_or(SerializationError::InvalidEncoding { field: "type" })?;
        let sig = reader.var_binary("sig")?;
        let sig = if sig.is_empty() {
            None
        } else {
            Some(sig.to_vec())
        };
        let payload = SecurePayload::read(block_type, reader)?;
        Ok(SecureData { sig, payload })
    }
}
