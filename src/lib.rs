/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! An append-only, hash-linked tree of blockchains with a key-hierarchy permission layer.
//!
//! The crate is built in three layers, each wrapping the one below:
//! 1. [`blockchain`]: linear chains of opaque, content-addressed blocks.
//! 2. [`blocktree`]: chains nested under blocks of other chains.
//! 3. [`secure`]: typed blocks (keys, zones, identities, collections, options, secrets, records)
//!    whose every write is authorized by a signature from the key hierarchy.
//!
//! Persistence and memoization are [pluggable](pluggables), as are the [cryptography
//! backend](types::crypto_primitives::CryptoProvider) and the [secrets broker](broker) used for
//! trusted reads.

pub mod blockchain;

pub mod blocktree;

pub mod broker;

pub mod codec;

pub mod errors;

pub mod events;

pub(crate) mod logging;

pub mod pluggables;

pub mod secure;

pub mod types;
