/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Binary encoding of blocks and their payloads.
//!
//! # Primitives
//!
//! All encodings in the blocktree are built from a handful of primitives, written by [`Writer`] and
//! read back by [`Reader`]:
//!
//! |Primitive|Encoding|
//! |---|---|
//! |Integer|Fixed-width (1, 2, 4, or 8 bytes), big-endian.|
//! |Hash|32 bytes. The all-zeroes hash encodes "no block".|
//! |Short binary|1-byte length prefix, then the bytes.|
//! |Variable binary|2-byte length prefix, then the bytes.|
//! |Remaining bytes|Everything up to the end of the input.|
//!
//! A length that does not fit its prefix, or input that ends in the middle of a field, is reported
//! as [`SerializationError::ArgumentOutOfBounds`] naming the field.
//!
//! # Payload codecs
//!
//! Types that are stored inside blocks implement [`PayloadCodec`]. The per-[`BlockType`] codecs are
//! defined in [`payloads`].
//!
//! [`BlockType`]: crate::types::payloads::BlockType

pub mod payloads;

use crate::{errors::SerializationError, types::data_types::CryptoHash};

/// A type that can be written into and read out of a block's bytes.
pub trait PayloadCodec: Sized {
    fn serialize(&self) -> Result<Vec<u8>, SerializationError> {
        let mut writer = Writer::new();
        self.write(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode an instance starting at `start`, returning it along with the index of the first byte
    /// after it.
    fn deserialize(bytes: &[u8], start: usize) -> Result<(Self, usize), SerializationError> {
        let mut reader = Reader::new(bytes, start);
        let payload = Self::read(&mut reader)?;
        Ok((payload, reader.index()))
    }

    fn write(&self, writer: &mut Writer) -> Result<(), SerializationError>;

    fn read(reader: &mut Reader<'_>) -> Result<Self, SerializationError>;
}

#[derive(Default)]
pub struct Writer(Vec<u8>);

impl Writer {
    pub fn new() -> Self {
        Writer(Vec::new())
    }

    pub fn u8(&mut self, value: u8) {
        self.0.push(value)
    }

    pub fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_be_bytes())
    }

    pub fn u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_be_bytes())
    }

    pub fn i64(&mut self, value: i64) {
        self.0.extend_from_slice(&value.to_be_bytes())
    }

    /// Write `hash`, or 32 zero bytes if it is `None`.
    pub fn hash(&mut self, hash: Option<&CryptoHash>) {
        let bytes = hash.map(CryptoHash::bytes).unwrap_or([0u8; 32]);
        self.0.extend_from_slice(&bytes)
    }

    /// Write `bytes` behind a 1-byte length prefix.
    pub fn short_binary(
        &mut self,
        field: &'static str,
        bytes: &[u8],
    ) -> Result<(), SerializationError> {
        let len = u8::try_from(bytes.len())
            .map_err(|_| SerializationError::ArgumentOutOfBounds { field })?;
        self.u8(len);
        self.0.extend_from_slice(bytes);
        Ok(())
    }

    /// Write `bytes` behind a 2-byte length prefix.
    pub fn var_binary(
        &mut self,
        field: &'static str,
        bytes: &[u8],
    ) -> Result<(), SerializationError> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| SerializationError::ArgumentOutOfBounds { field })?;
        self.u16(len);
        self.0.extend_from_slice(bytes);
        Ok(())
    }

    /// Write `bytes` without a length prefix. Only valid as the last field of an encoding.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

pub struct Reader<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], start: usize) -> Self {
        Reader {
            bytes,
            index: start,
        }
    }

    /// Index of the next byte to be read.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], SerializationError> {
        let end = self
            .index
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(SerializationError::ArgumentOutOfBounds { field })?;
        let slice = &self.bytes[self.index..end];
        self.index = end;
        Ok(slice)
    }

    pub fn fixed<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], SerializationError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(field, N)?);
        Ok(array)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, SerializationError> {
        Ok(self.fixed::<1>(field)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, SerializationError> {
        Ok(u16::from_be_bytes(self.fixed(field)?))
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, SerializationError> {
        Ok(u64::from_be_bytes(self.fixed(field)?))
    }

    pub fn i64(&mut self, field: &'static str) -> Result<i64, SerializationError> {
        Ok(i64::from_be_bytes(self.fixed(field)?))
    }

    /// Read a 32-byte hash, mapping the all-zeroes hash to `None`.
    pub fn hash(&mut self, field: &'static str) -> Result<Option<CryptoHash>, SerializationError> {
        Ok(CryptoHash::new(self.fixed(field)?).non_null())
    }

    pub fn short_binary(&mut self, field: &'static str) -> Result<&'a [u8], SerializationError> {
        let len = self.u8(field)?;
        self.take(field, len as usize)
    }

    pub fn var_binary(&mut self, field: &'static str) -> Result<&'a [u8], SerializationError> {
        let len = self.u16(field)?;
        self.take(field, len as usize)
    }

    /// Read a short binary field as UTF-8.
    pub fn short_string(&mut self, field: &'static str) -> Result<String, SerializationError> {
        let bytes = self.short_binary(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerializationError::InvalidEncoding { field })
    }

    pub fn remaining(&mut self) -> &'a [u8] {
        let start = self.index.min(self.bytes.len());
        self.index = self.bytes.len();
        &self.bytes[start..]
    }
}
