/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple layers of the blocktree.
//!
//! Types specific to a single layer live next to that layer, e.g., [`crate::secure::signatures`].

pub mod block;

pub mod crypto_primitives;

pub mod data_types;

pub mod keypair;

pub mod keys;

pub mod payloads;
