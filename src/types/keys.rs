/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Action`] a key may be authorized for, and the derived [`KeyRecord`] fact.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{CryptoHash, PublicKeyBytes, Timestamp};

/// Operation a key is authorized to perform.
///
/// `Any` subsumes every other action. The root key is always authorized for `Any`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub enum Action {
    Read,
    Write,
    Any,
}

impl Action {
    /// The single byte this action is encoded as inside a key payload.
    pub const fn to_byte(self) -> u8 {
        match self {
            Action::Read => 1,
            Action::Write => 2,
            Action::Any => 0xFF,
        }
    }

    pub const fn from_byte(byte: u8) -> Option<Action> {
        match byte {
            1 => Some(Action::Read),
            2 => Some(Action::Write),
            0xFF => Some(Action::Any),
            _ => None,
        }
    }

    /// Whether a key authorized for `self` may perform `required`.
    pub fn permits(self, required: Action) -> bool {
        self == Action::Any || self == required
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => f.write_str("read"),
            Action::Write => f.write_str("write"),
            Action::Any => f.write_str("any"),
        }
    }
}

/// "This public key was authorized for this action during this time window", as derived by scanning
/// the `root` and `key` blocks of a chain.
///
/// A record whose `parent_key` is `None` is a root of trust: it authorizes itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: PublicKeyBytes,
    pub parent_key: Option<PublicKeyBytes>,
    pub action: Action,
    pub ts_init: Timestamp,
    pub ts_exp: Timestamp,
    /// The block the record was read from.
    pub block: CryptoHash,
}

impl KeyRecord {
    /// Whether `timestamp` falls within `[ts_init, ts_exp)`.
    ///
    /// Revocation records have `ts_init == ts_exp`, so they are never active.
    pub fn is_active_at(&self, timestamp: Timestamp) -> bool {
        self.ts_init <= timestamp && timestamp < self.ts_exp
    }

    pub fn is_root(&self) -> bool {
        self.parent_key.is_none()
    }
}
