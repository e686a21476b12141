use blocktree::{
    broker::Broker,
    errors::{BlocktreeError, BrokerError, InvalidKeyError, InvalidSignatureError},
    secure::{
        operations::{AddKey, CreateChild, RevokeKey},
        trusted_read::{TrustedRead, TrustedReadResult},
    },
    types::{
        crypto_primitives::{CryptoProvider, Ed25519Crypto},
        data_types::CryptoHash,
        keypair::Keypair,
        keys::Action,
        payloads::{BlockOptions, BlockType},
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    logging::setup_logger,
    mem_broker::MemBroker,
    tree::{rooted_tree, sign, RootedTree, TestBlocktree},
};

const TOKEN: &[u8] = b"read request 42";

/// A tree with a collection whose options are encrypted for `authorized`, and a broker holding the
/// authorized private key. Both `authorized` and `trusted` may read in the root zone.
struct Fixture {
    tree: TestBlocktree,
    root_key: Keypair,
    root_zone: CryptoHash,
    broker: MemBroker,
    authorized: Keypair,
    trusted: Keypair,
    collection: CryptoHash,
}

fn secret_options() -> BlockOptions {
    BlockOptions::from_iter([("name", "payroll"), ("owner", "finance")])
}

fn add_reader(tree: &mut TestBlocktree, root_key: &Keypair, root_zone: CryptoHash, key: &Keypair) {
    tree.add_key(
        AddKey::builder()
            .sig(sign(root_key))
            .block(root_zone)
            .key(key.public_key().clone())
            .action(Action::Read)
            .build(),
    )
    .unwrap();
}

fn fixture() -> Fixture {
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();
    let authorized = Keypair::generate();
    let trusted = Keypair::generate();
    add_reader(&mut tree, &root_key, root_zone, &authorized);
    add_reader(&mut tree, &root_key, root_zone, &trusted);

    let envelope = tree
        .encrypt_block_data(
            authorized.public_key(),
            BlockType::Collection,
            &secret_options(),
        )
        .unwrap();
    let collection = tree
        .create_collection(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .options(envelope)
                .build(),
        )
        .unwrap();

    let mut broker = MemBroker::new();
    broker
        .add_authorized_key(
            authorized.public_key().clone(),
            authorized.private_key().clone(),
        )
        .unwrap();

    Fixture {
        tree,
        root_key,
        root_zone,
        broker,
        authorized,
        trusted,
        collection,
    }
}

fn token_sig(keypair: &Keypair) -> Vec<u8> {
    Ed25519Crypto::new()
        .sign(keypair.private_key(), TOKEN)
        .unwrap()
}

#[test]
fn plain_read_test() {
    setup_logger(LevelFilter::Trace);
    let Fixture {
        tree,
        root_zone,
        broker,
        trusted,
        ..
    } = fixture();

    let read = TrustedRead::builder()
        .block(root_zone)
        .key(trusted.public_key().clone())
        .build();
    match tree.perform_trusted_read(&read, &broker).unwrap() {
        TrustedReadResult::Plain(block) => {
            assert_eq!(block.hash, root_zone);
            assert_eq!(block.block_type(), BlockType::Zone);
        }
        result => panic!("expected a plain block, got {:?}", result),
    }
    assert_eq!(broker.requests(), 0);
}

#[test]
fn read_by_encryption_key_test() {
    let Fixture {
        tree,
        broker,
        authorized,
        collection,
        ..
    } = fixture();

    // The key the data is encrypted for needs no token signature and no broker.
    let read = TrustedRead::builder()
        .block(collection)
        .key(authorized.public_key().clone())
        .build();
    let TrustedReadResult::Encrypted(envelope) = tree.perform_trusted_read(&read, &broker).unwrap()
    else {
        panic!("expected the stored envelope");
    };
    assert_eq!(&envelope.key, authorized.public_key());
    assert_eq!(broker.requests(), 0);

    let options = tree
        .decrypt_block_data(&envelope, BlockType::Collection, Some(authorized.private_key()))
        .unwrap();
    assert_eq!(options, secret_options());
}

#[test]
fn brokered_read_test() {
    setup_logger(LevelFilter::Trace);
    let Fixture {
        tree,
        broker,
        authorized,
        trusted,
        collection,
        ..
    } = fixture();

    // 1. The trusted key proves itself by signing the token.
    log::debug!("Reading an encrypted collection through the broker.");
    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&trusted))
        .build();
    let TrustedReadResult::Reencrypted(envelope) =
        tree.perform_trusted_read(&read, &broker).unwrap()
    else {
        panic!("expected a re-encrypted envelope");
    };
    assert_eq!(broker.requests(), 1);
    assert_eq!(&envelope.key, trusted.public_key());

    // 2. The re-encrypted data opens with the trusted key only.
    let options = tree
        .decrypt_block_data(&envelope, BlockType::Collection, Some(trusted.private_key()))
        .unwrap();
    assert_eq!(options, secret_options());
    assert!(tree
        .decrypt_block_data(&envelope, BlockType::Collection, Some(authorized.private_key()))
        .is_err());
}

#[test]
fn token_signature_test() {
    let Fixture {
        tree,
        broker,
        trusted,
        collection,
        ..
    } = fixture();

    // 1. No signature.
    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { key: Some(key) }))
            if &key == trusted.public_key()
    ));

    // 2. A signature by another key.
    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&Keypair::generate()))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::DoesNotMatch { .. }))
    ));

    // 3. A signature over another token.
    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(b"another token".to_vec())
        .sig(token_sig(&trusted))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::DoesNotMatch { .. }))
    ));
    assert_eq!(broker.requests(), 0);
}

#[test]
fn untrusted_reader_test() {
    let Fixture {
        tree,
        broker,
        collection,
        ..
    } = fixture();

    let stranger = Keypair::generate();
    let read = TrustedRead::builder()
        .block(collection)
        .key(stranger.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&stranger))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::InvalidKey(InvalidKeyError::NotTrusted { key, block }))
            if &key == stranger.public_key() && block == collection
    ));
    assert_eq!(broker.requests(), 0);
}

#[test]
fn revoked_authorized_key_test() {
    setup_logger(LevelFilter::Trace);
    let Fixture {
        mut tree,
        root_key,
        root_zone,
        broker,
        authorized,
        trusted,
        collection,
    } = fixture();

    log::debug!("Revoking the key the collection is encrypted for.");
    tree.revoke_key(
        RevokeKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(authorized.public_key().clone())
            .action(Action::Read)
            .build(),
    )
    .unwrap();

    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&trusted))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::InvalidKey(InvalidKeyError::NotAuthorized { key, block }))
            if &key == authorized.public_key() && block == collection
    ));
    assert_eq!(broker.requests(), 0);
}

#[test]
fn broker_failure_test() {
    let Fixture {
        mut tree,
        root_key,
        root_zone,
        mut broker,
        authorized,
        trusted,
        collection,
    } = fixture();

    // 1. The broker no longer holds the authorized key.
    broker.revoke_authorized_key(authorized.public_key()).unwrap();
    let read = TrustedRead::builder()
        .block(collection)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&trusted))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::Broker(BrokerError::UnknownAuthorizedKey { key }))
            if &key == authorized.public_key()
    ));
    assert!(matches!(
        broker.revoke_authorized_key(authorized.public_key()),
        Err(BrokerError::UnknownAuthorizedKey { .. })
    ));

    // 2. Data encrypted for a key the broker never held.
    let other = Keypair::generate();
    add_reader(&mut tree, &root_key, root_zone, &other);
    let envelope = tree
        .encrypt_block_data(other.public_key(), BlockType::Identity, &secret_options())
        .unwrap();
    let identity = tree
        .create_identity(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .options(envelope)
                .build(),
        )
        .unwrap();
    let read = TrustedRead::builder()
        .block(identity)
        .key(trusted.public_key().clone())
        .token(TOKEN.to_vec())
        .sig(token_sig(&trusted))
        .build();
    assert!(matches!(
        tree.perform_trusted_read(&read, &broker),
        Err(BlocktreeError::Broker(BrokerError::UnknownAuthorizedKey { .. }))
    ));
    assert_eq!(broker.requests(), 2);
}

#[test]
fn encryption_is_limited_to_option_types_test() {
    let Fixture {
        tree, authorized, ..
    } = fixture();
    assert!(tree
        .encrypt_block_data(authorized.public_key(), BlockType::Record, &secret_options())
        .is_err());
    assert!(tree
        .encrypt_block_data(authorized.public_key(), BlockType::Options, &secret_options())
        .is_ok());
}
