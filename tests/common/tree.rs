//! Helpers that set up a secure blocktree over in-memory collaborators.

use blocktree::{
    secure::{operations::CreateChild, signatures::Signature, Configuration, SecureBlocktree},
    types::{
        crypto_primitives::Ed25519Crypto, data_types::CryptoHash, keypair::Keypair,
        payloads::BlockOptions,
    },
};

use super::{mem_cache::MemCache, mem_storage::MemStorage};

pub(crate) type TestBlocktree = SecureBlocktree<MemStorage, MemCache, Ed25519Crypto>;

/// A secure blocktree with a root block and a root zone, both created with `root_key`.
pub(crate) struct RootedTree {
    pub(crate) tree: TestBlocktree,
    pub(crate) storage: MemStorage,
    pub(crate) cache: MemCache,
    pub(crate) root_key: Keypair,
    pub(crate) root: CryptoHash,
    pub(crate) root_zone: CryptoHash,
}

pub(crate) fn new_secure_blocktree() -> (TestBlocktree, MemStorage, MemCache) {
    let storage = MemStorage::new();
    let cache = MemCache::new();
    let configuration = Configuration::builder().log_events(true).build();
    let tree = SecureBlocktree::new(
        storage.clone(),
        cache.clone(),
        Ed25519Crypto::new(),
        configuration,
    );
    (tree, storage, cache)
}

pub(crate) fn rooted_tree() -> RootedTree {
    let (mut tree, storage, cache) = new_secure_blocktree();
    let root_key = Keypair::generate();
    let root = tree.create_root(root_key.public_key().clone()).unwrap();
    let root_zone = tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root)
                .options(BlockOptions::from_iter([("name", "root")]))
                .build(),
        )
        .unwrap();

    RootedTree {
        tree,
        storage,
        cache,
        root_key,
        root,
        root_zone,
    }
}

/// A deferred signature by `keypair`.
pub(crate) fn sign(keypair: &Keypair) -> Signature {
    Signature::from_keypair(Ed25519Crypto::new(), keypair.private_key().clone())
}
