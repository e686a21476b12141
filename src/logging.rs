/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the secure blocktree's
//! [configuration](crate::secure::Configuration).
//!
//! The blocktree logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how an [AddKey](crate::events::AddKeyEvent) is printed:
//!
//! ```text
//! AddKey, 1701329264, Id5u7f6, fNGCJyk, write, 3qPZbXw
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the hash of the new key
//!   block.
//! - The fourth value is the first seven characters of the Base64 encoding of the added key.
//! - The fifth value is the action the key is authorized for.
//! - The sixth value is the abbreviated key that signed the record, or `-` for bootstrapped keys.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::{events::*, types::data_types::CryptoHash};

// Names of each event in PascalCase for printing:
pub const WRITE_BLOCK: &str = "WriteBlock";
pub const CREATE_ROOT: &str = "CreateRoot";
pub const ADD_KEY: &str = "AddKey";
pub const REVOKE_KEY: &str = "RevokeKey";
pub const ADD_OPTIONS: &str = "AddOptions";
pub const ADD_SECRET: &str = "AddSecret";
pub const ADD_RECORD: &str = "AddRecord";
pub const CREATE_CHILD: &str = "CreateChild";
pub const TRUSTED_READ: &str = "TrustedRead";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

/// Log `event` with the default logger of its type.
pub(crate) fn log_event(event: &Event) {
    match event {
        Event::WriteBlock(event) => WriteBlockEvent::get_logger()(event),
        Event::CreateRoot(event) => CreateRootEvent::get_logger()(event),
        Event::AddKey(event) => AddKeyEvent::get_logger()(event),
        Event::RevokeKey(event) => RevokeKeyEvent::get_logger()(event),
        Event::AddOptions(event) => AddOptionsEvent::get_logger()(event),
        Event::AddSecret(event) => AddSecretEvent::get_logger()(event),
        Event::AddRecord(event) => AddRecordEvent::get_logger()(event),
        Event::CreateChild(event) => CreateChildEvent::get_logger()(event),
        Event::TrustedRead(event) => TrustedReadEvent::get_logger()(event),
    }
}

impl Logger for WriteBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |write_block_event: &WriteBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                WRITE_BLOCK,
                secs_since_unix_epoch(write_block_event.timestamp),
                first_seven_base64_chars(&write_block_event.block.bytes()),
                write_block_event.block_type,
                optional_hash(write_block_event.prev.as_ref()),
                optional_hash(write_block_event.parent.as_ref())
            )
        };
        Box::new(logger)
    }
}

impl Logger for CreateRootEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |create_root_event: &CreateRootEvent| {
            log::info!(
                "{}, {}, {}, {}",
                CREATE_ROOT,
                secs_since_unix_epoch(create_root_event.timestamp),
                first_seven_base64_chars(&create_root_event.block.bytes()),
                first_seven_base64_chars(create_root_event.key.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for AddKeyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |add_key_event: &AddKeyEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                ADD_KEY,
                secs_since_unix_epoch(add_key_event.timestamp),
                first_seven_base64_chars(&add_key_event.block.bytes()),
                first_seven_base64_chars(add_key_event.key.bytes()),
                add_key_event.action,
                add_key_event
                    .parent_key
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |key| first_seven_base64_chars(key.bytes()))
            )
        };
        Box::new(logger)
    }
}

impl Logger for RevokeKeyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |revoke_key_event: &RevokeKeyEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                REVOKE_KEY,
                secs_since_unix_epoch(revoke_key_event.timestamp),
                first_seven_base64_chars(&revoke_key_event.block.bytes()),
                first_seven_base64_chars(revoke_key_event.key.bytes()),
                revoke_key_event.action
            )
        };
        Box::new(logger)
    }
}

impl Logger for AddOptionsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |add_options_event: &AddOptionsEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ADD_OPTIONS,
                secs_since_unix_epoch(add_options_event.timestamp),
                first_seven_base64_chars(&add_options_event.block.bytes()),
                add_options_event.is_encrypted
            )
        };
        Box::new(logger)
    }
}

impl Logger for AddSecretEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |add_secret_event: &AddSecretEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ADD_SECRET,
                secs_since_unix_epoch(add_secret_event.timestamp),
                first_seven_base64_chars(&add_secret_event.block.bytes()),
                first_seven_base64_chars(add_secret_event.key.bytes()),
                add_secret_event.reference
            )
        };
        Box::new(logger)
    }
}

impl Logger for AddRecordEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |add_record_event: &AddRecordEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ADD_RECORD,
                secs_since_unix_epoch(add_record_event.timestamp),
                first_seven_base64_chars(&add_record_event.block.bytes()),
                add_record_event.len
            )
        };
        Box::new(logger)
    }
}

impl Logger for CreateChildEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |create_child_event: &CreateChildEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                CREATE_CHILD,
                secs_since_unix_epoch(create_child_event.timestamp),
                first_seven_base64_chars(&create_child_event.block.bytes()),
                create_child_event.block_type,
                first_seven_base64_chars(&create_child_event.parent.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for TrustedReadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |trusted_read_event: &TrustedReadEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                TRUSTED_READ,
                secs_since_unix_epoch(trusted_read_event.timestamp),
                first_seven_base64_chars(&trusted_read_event.block.bytes()),
                first_seven_base64_chars(trusted_read_event.trusted_key.bytes()),
                trusted_read_event.brokered
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn optional_hash(hash: Option<&CryptoHash>) -> String {
    hash.map_or_else(|| "-".to_string(), |hash| first_seven_base64_chars(&hash.bytes()))
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
