/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of blocktree events for event handling and logging.
//!
//! An event for a given operation indicates that the operation has been completed. Events are
//! [logged](crate::logging) if [`Configuration::log_events`](crate::secure::Configuration) is set,
//! and sent to the event publisher registered with
//! [`SecureBlocktree::with_event_publisher`](crate::secure::SecureBlocktree::with_event_publisher),
//! if any.

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::types::{
    data_types::{CryptoHash, PublicKeyBytes},
    keys::Action,
    payloads::BlockType,
};

#[derive(Clone, Debug)]
pub enum Event {
    // Events that write a block.
    WriteBlock(WriteBlockEvent),
    CreateRoot(CreateRootEvent),
    AddKey(AddKeyEvent),
    RevokeKey(RevokeKeyEvent),
    AddOptions(AddOptionsEvent),
    AddSecret(AddSecretEvent),
    AddRecord(AddRecordEvent),
    CreateChild(CreateChildEvent),
    // Events that only read.
    TrustedRead(TrustedReadEvent),
}

impl Event {
    /// Send `event` to `event_publisher`, if there is one. Events sent after the receiving end has
    /// been dropped are discarded.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

/// Any secure block was written. Emitted before the operation-specific event.
#[derive(Clone, Debug)]
pub struct WriteBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub block_type: BlockType,
    pub prev: Option<CryptoHash>,
    pub parent: Option<CryptoHash>,
}

#[derive(Clone, Debug)]
pub struct CreateRootEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
}

#[derive(Clone, Debug)]
pub struct AddKeyEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    pub action: Action,
    /// The key that signed the new key record. `None` for keys bootstrapped into the root chain.
    pub parent_key: Option<PublicKeyBytes>,
}

#[derive(Clone, Debug)]
pub struct RevokeKeyEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    pub action: Action,
}

#[derive(Clone, Debug)]
pub struct AddOptionsEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub is_encrypted: bool,
}

#[derive(Clone, Debug)]
pub struct AddSecretEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub key: PublicKeyBytes,
    pub reference: String,
}

#[derive(Clone, Debug)]
pub struct AddRecordEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub len: usize,
}

/// A zone, identity, or collection chain was created.
#[derive(Clone, Debug)]
pub struct CreateChildEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub block_type: BlockType,
    pub parent: CryptoHash,
}

#[derive(Clone, Debug)]
pub struct TrustedReadEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub trusted_key: PublicKeyBytes,
    /// Whether a broker re-encrypted the block's data for `trusted_key`.
    pub brokered: bool,
}
