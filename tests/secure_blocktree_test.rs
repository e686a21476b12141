use std::sync::mpsc;

use blocktree::{
    errors::{
        BlocktreeError, InvalidBlockError, InvalidKeyError, InvalidRootError,
        InvalidSignatureError,
    },
    events::Event,
    secure::{
        key_scan::KeyScan,
        operations::{AddKey, AddOptions, AddRecord, AddSecret, CreateChild, RevokeKey},
        signatures::Signature,
    },
    types::{
        data_types::Timestamp,
        keypair::Keypair,
        keys::Action,
        payloads::{BlockOptions, BlockType, SecurePayload},
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    logging::setup_logger,
    tree::{new_secure_blocktree, rooted_tree, sign, RootedTree},
};

fn options(pairs: &[(&str, &str)]) -> BlockOptions {
    pairs.iter().copied().collect()
}

#[test]
fn root_uniqueness_test() {
    setup_logger(LevelFilter::Trace);
    let (mut tree, _, _) = new_secure_blocktree();
    let root_key = Keypair::generate();

    let root = tree.create_root(root_key.public_key().clone()).unwrap();
    let block = tree.read_secure_block(&root).unwrap();
    assert_eq!(block.block_type(), BlockType::Root);
    assert_eq!(block.sig, None);
    assert_eq!(block.parent, None);
    assert_eq!(tree.get_system_root(), Some(root));

    let result = tree.create_root(Keypair::generate().public_key().clone());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidRoot(InvalidRootError { block_count: 1 }))
    ));
    assert_eq!(tree.blocktree().count_blocks(), 1);
}

#[test]
fn delegated_zone_creation_test() {
    setup_logger(LevelFilter::Trace);

    // 1. Create the root, signed by K0, and the root zone.
    let RootedTree {
        mut tree,
        root_key,
        root,
        root_zone,
        ..
    } = rooted_tree();
    assert_eq!(tree.get_root_zone().unwrap(), Some(root_zone));
    assert_eq!(tree.get_block_name(&root_zone).unwrap(), Some("root".to_string()));

    // 2. Add K1 to the root zone, signed by K0.
    log::debug!("Adding K1 to the root zone.");
    let k1 = Keypair::generate();
    let key_block = tree
        .add_key(
            AddKey::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .key(k1.public_key().clone())
                .action(Action::Write)
                .build(),
        )
        .unwrap();
    let key_record = tree.read_secure_block(&key_block).unwrap();
    let payload = key_record.payload.key_payload().unwrap();
    assert_eq!(payload.parent_key.as_ref(), Some(root_key.public_key()));
    assert_eq!(payload.ts_init, Timestamp::ZERO);
    assert_eq!(payload.ts_exp, Timestamp::MAX);
    assert_eq!(key_record.parent, Some(root));

    // 3. Create a child zone, signed by K1.
    log::debug!("Creating a child zone signed by K1.");
    let child = tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&k1))
                .block(root_zone)
                .options(options(&[("name", "child")]))
                .build(),
        )
        .unwrap();
    let block = tree.read_secure_block(&child).unwrap();
    assert_eq!(block.block_type(), BlockType::Zone);
    assert_eq!(block.parent, Some(root_zone));
    assert_eq!(block.prev, None);
    assert!(block.sig.is_some());
    assert_eq!(tree.get_block_name(&child).unwrap(), Some("child".to_string()));

    // 4. The root zone is unchanged by the second zone.
    assert_eq!(tree.get_root_zone().unwrap(), Some(root_zone));
}

#[test]
fn revocation_test() {
    setup_logger(LevelFilter::Trace);
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();
    let k1 = Keypair::generate();
    let added = tree
        .add_key(
            AddKey::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .key(k1.public_key().clone())
                .action(Action::Write)
                .build(),
        )
        .unwrap();

    // 1. Revoke K1.
    log::debug!("Revoking K1.");
    tree.revoke_key(
        RevokeKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(k1.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();

    // 2. K1 no longer shows up in active scans, but its record is still readable.
    let active = tree
        .perform_key_scan(&KeyScan::builder().block(root_zone).is_recursive(true).build())
        .unwrap();
    assert!(active.iter().all(|record| &record.key != k1.public_key()));
    assert!(active.iter().any(|record| &record.key == root_key.public_key()));

    let all = tree
        .perform_key_scan(&KeyScan::builder().block(root_zone).is_active(false).build())
        .unwrap();
    assert_eq!(all.iter().filter(|record| &record.key == k1.public_key()).count(), 2);
    assert!(tree.read_secure_block(&added).is_ok());

    // 3. K1 can no longer create zones.
    log::debug!("Creating a child zone signed by revoked K1.");
    let result = tree.create_zone(
        CreateChild::builder()
            .sig(sign(&k1))
            .block(root_zone)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { key: Some(key) }))
            if &key == k1.public_key()
    ));

    // 4. Adding K1 again re-activates it.
    tree.add_key(
        AddKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(k1.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    assert!(tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&k1))
                .block(root_zone)
                .build()
        )
        .is_ok());
}

#[test]
fn expired_key_test() {
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();
    let expired = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(expired.public_key().clone())
            .action(Action::Write)
            .ts_init(Timestamp::new(1))
            .ts_exp(Timestamp::new(2))
            .build(),
    )
    .unwrap();

    let result = tree.create_collection(
        CreateChild::builder()
            .sig(sign(&expired))
            .block(root_zone)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { .. }))
    ));

    // The key was active in the past.
    let seek = tree
        .perform_key_seek(&root_zone, Action::Write, expired.public_key(), Timestamp::new(1))
        .unwrap();
    assert!(seek.is_some());
}

#[test]
fn authorization_transitivity_test() {
    setup_logger(LevelFilter::Trace);
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();

    // 1. K1 is authorized at the root zone; K2 only in zone A.
    let k1 = Keypair::generate();
    let k2 = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(k1.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    let zone_a = tree
        .create_zone(CreateChild::builder().sig(sign(&k1)).block(root_zone).build())
        .unwrap();
    let zone_b = tree
        .create_zone(CreateChild::builder().sig(sign(&k1)).block(root_zone).build())
        .unwrap();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&k1))
            .block(zone_a)
            .key(k2.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();

    // 2. K1 signs transitively in a collection under zone A.
    log::debug!("Creating a collection two levels below K1.");
    let collection = tree
        .create_collection(CreateChild::builder().sig(sign(&k1)).block(zone_a).build())
        .unwrap();
    let record = tree
        .add_record(
            AddRecord::builder()
                .sig(sign(&k1))
                .block(collection)
                .data(b"entry".to_vec())
                .build(),
        )
        .unwrap();
    let block = tree.read_secure_block(&record).unwrap();
    assert_eq!(
        block.payload,
        SecurePayload::Record(blocktree::types::payloads::RecordPayload {
            data: b"entry".to_vec()
        })
    );
    assert_eq!(block.prev, Some(collection));
    assert_eq!(block.parent, Some(zone_a));

    // 3. K2 signs under zone A.
    assert!(tree
        .create_identity(CreateChild::builder().sig(sign(&k2)).block(zone_a).build())
        .is_ok());

    // 4. K2 cannot sign in the sibling zone B.
    log::debug!("Creating an identity in a sibling zone.");
    let result =
        tree.create_identity(CreateChild::builder().sig(sign(&k2)).block(zone_b).build());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { .. }))
    ));

    // 5. K2 cannot add keys to zone A itself: its authority comes from zone A.
    let result = tree.add_key(
        AddKey::builder()
            .sig(sign(&k2))
            .block(zone_a)
            .key(Keypair::generate().public_key().clone())
            .action(Action::Write)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { .. }))
    ));
}

#[test]
fn nonce_replay_test() {
    setup_logger(LevelFilter::Trace);
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();

    let first = tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .build(),
        )
        .unwrap();
    let copied = tree.read_secure_block(&first).unwrap().sig.unwrap();

    // The copied signature verifies for a sibling, but its nonce is taken.
    log::debug!("Creating a sibling zone with a copied signature.");
    let result = tree.create_zone(
        CreateChild::builder()
            .sig(Signature::Eager(copied))
            .block(root_zone)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NonceAlreadyUsed { block }))
            if block == first
    ));
}

#[test]
fn signature_position_test() {
    let RootedTree {
        mut tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();

    // A signature made for creating a chain does not verify for an append to that chain.
    let zone = tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .build(),
        )
        .unwrap();
    let copied = tree.read_secure_block(&zone).unwrap().sig.unwrap();
    let result = tree.add_options(
        AddOptions::builder()
            .sig(Signature::Eager(copied))
            .block(zone)
            .options(options(&[("color", "blue")]))
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::DoesNotMatch { key }))
            if &key == root_key.public_key()
    ));
    assert_eq!(tree.blocktree().get_head_block(&zone).unwrap(), zone);
}

#[test]
fn placement_test() {
    let RootedTree {
        mut tree,
        root_key,
        root,
        root_zone,
        ..
    } = rooted_tree();

    // 1. A second zone under the root chain is rejected.
    let result = tree.create_zone(CreateChild::builder().sig(sign(&root_key)).block(root).build());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidBlock(InvalidBlockError::InvalidParentType {
            found: BlockType::Root,
            block_type: BlockType::Zone,
            ..
        }))
    ));

    // 2. Identities nest only under zones.
    let identity = tree
        .create_identity(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .build(),
        )
        .unwrap();
    let result = tree.create_collection(
        CreateChild::builder()
            .sig(sign(&root_key))
            .block(identity)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidBlock(InvalidBlockError::InvalidParentType {
            found: BlockType::Identity,
            block_type: BlockType::Collection,
            ..
        }))
    ));

    // 3. Records only go into collections.
    let result = tree.add_record(
        AddRecord::builder()
            .sig(sign(&root_key))
            .block(identity)
            .data(vec![1])
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidBlock(InvalidBlockError::InvalidParentType {
            found: BlockType::Identity,
            block_type: BlockType::Record,
            ..
        }))
    ));

    // 4. Children need a signature and a parent.
    let result = tree.create_zone(CreateChild::builder().block(root_zone).build());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { key: None }))
    ));
    let result = tree.create_zone(CreateChild::builder().sig(sign(&root_key)).build());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidBlock(InvalidBlockError::NotFound { block: None }))
    ));
}

#[test]
fn bootstrap_keys_test() {
    let RootedTree {
        mut tree,
        root,
        root_zone,
        ..
    } = rooted_tree();

    // Keys added to the root chain need no signature and are roots of trust.
    let admin = Keypair::generate();
    let block = tree
        .add_key(
            AddKey::builder()
                .block(root)
                .key(admin.public_key().clone())
                .action(Action::Any)
                .build(),
        )
        .unwrap();
    let record = tree.read_secure_block(&block).unwrap();
    assert_eq!(record.sig, None);
    assert_eq!(record.payload.key_payload().unwrap().parent_key, None);
    assert!(tree
        .validate_parent_key(&root, admin.public_key(), Timestamp::now(), false)
        .unwrap());

    // The admin may now delegate in the root zone.
    let delegate = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&admin))
            .block(root_zone)
            .key(delegate.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    assert!(tree
        .validate_parent_key(&root_zone, delegate.public_key(), Timestamp::now(), true)
        .unwrap());
    assert!(!tree
        .validate_parent_key(&root_zone, delegate.public_key(), Timestamp::now(), false)
        .unwrap());

    // Keys outside the root chain need a signature.
    let result = tree.add_key(
        AddKey::builder()
            .block(root_zone)
            .key(Keypair::generate().public_key().clone())
            .action(Action::Write)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidSignature(InvalidSignatureError::NotFound { key: None }))
    ));
}

#[test]
fn untrusted_parent_key_test() {
    setup_logger(LevelFilter::Trace);
    let RootedTree {
        mut tree,
        root_key,
        root,
        root_zone,
        ..
    } = rooted_tree();
    let zone = tree
        .create_zone(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .build(),
        )
        .unwrap();

    // 1. A bootstrap admin delegates K1 in the root zone, and is then revoked.
    let admin = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .block(root)
            .key(admin.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    let k1 = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&admin))
            .block(root_zone)
            .key(k1.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    tree.revoke_key(
        RevokeKey::builder()
            .block(root)
            .key(admin.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();

    // 2. K1 is still authorized, but no longer chains back to a root of trust.
    assert!(tree
        .perform_key_seek(&root_zone, Action::Write, k1.public_key(), Timestamp::now())
        .unwrap()
        .is_some());
    assert!(!tree
        .validate_parent_key(&root_zone, k1.public_key(), Timestamp::now(), true)
        .unwrap());

    // 3. K1 may sign blocks, but may not vouch for new keys.
    assert!(tree
        .create_identity(CreateChild::builder().sig(sign(&k1)).block(zone).build())
        .is_ok());
    log::debug!("Adding a key signed by an untrusted key.");
    let result = tree.add_key(
        AddKey::builder()
            .sig(sign(&k1))
            .block(zone)
            .key(Keypair::generate().public_key().clone())
            .action(Action::Write)
            .build(),
    );
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidKey(InvalidKeyError::UntrustedParentKey { key, block }))
            if &key == k1.public_key() && block == root_zone
    ));
}

#[test]
fn options_secrets_and_events_test() {
    setup_logger(LevelFilter::Trace);
    let RootedTree {
        tree,
        root_key,
        root_zone,
        ..
    } = rooted_tree();
    let (sender, receiver) = mpsc::channel();
    let mut tree = tree.with_event_publisher(sender);

    // 1. Options go after the head of the zone.
    let options_block = tree
        .add_options(
            AddOptions::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .options(options(&[("color", "blue"), ("size", "10")]))
                .build(),
        )
        .unwrap();
    let block = tree.read_secure_block(&options_block).unwrap();
    assert_eq!(block.prev, Some(root_zone));
    let stored = block.payload.options().unwrap().plain().unwrap();
    assert_eq!(stored.get("color"), Some("blue"));
    assert_eq!(stored.get("size"), Some("10"));

    // 2. A collection key may add secrets to its own collection.
    let collection = tree
        .create_collection(
            CreateChild::builder()
                .sig(sign(&root_key))
                .block(root_zone)
                .build(),
        )
        .unwrap();
    let owner = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&root_key))
            .block(collection)
            .key(owner.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();
    let secret = tree
        .add_secret(
            AddSecret::builder()
                .sig(sign(&owner))
                .block(collection)
                .key(owner.public_key().clone())
                .reference("db-password")
                .secret(vec![1, 2, 3])
                .build(),
        )
        .unwrap();
    match tree.read_secure_block(&secret).unwrap().payload {
        SecurePayload::Secret(payload) => {
            assert_eq!(payload.reference, "db-password");
            assert_eq!(payload.secret, vec![1, 2, 3]);
        }
        payload => panic!("expected a secret, got {:?}", payload),
    }

    // 3. Every mutation was published, each preceded by its block write.
    let events: Vec<Event> = receiver.try_iter().collect();
    let names: Vec<&str> = events
        .iter()
        .map(|event| match event {
            Event::WriteBlock(_) => "WriteBlock",
            Event::AddOptions(_) => "AddOptions",
            Event::CreateChild(_) => "CreateChild",
            Event::AddKey(_) => "AddKey",
            Event::AddSecret(_) => "AddSecret",
            _ => "Other",
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "WriteBlock",
            "AddOptions",
            "WriteBlock",
            "CreateChild",
            "WriteBlock",
            "AddKey",
            "WriteBlock",
            "AddSecret"
        ]
    );
}

#[test]
fn cache_is_not_authoritative_test() {
    let RootedTree {
        mut tree,
        cache,
        root_key,
        root,
        root_zone,
        ..
    } = rooted_tree();
    let k1 = Keypair::generate();
    tree.add_key(
        AddKey::builder()
            .sig(sign(&root_key))
            .block(root_zone)
            .key(k1.public_key().clone())
            .action(Action::Write)
            .build(),
    )
    .unwrap();

    cache.clear();
    assert_eq!(tree.get_system_root(), Some(root));
    assert_eq!(tree.get_root_zone().unwrap(), Some(root_zone));
    assert_eq!(tree.get_block_name(&root_zone).unwrap(), Some("root".to_string()));
    assert!(tree
        .create_zone(CreateChild::builder().sig(sign(&k1)).block(root_zone).build())
        .is_ok());
}

#[test]
fn root_zone_under_root_chain_key_test() {
    setup_logger(LevelFilter::Trace);
    let (mut tree, _, cache) = new_secure_blocktree();
    let root_key = Keypair::generate();
    let root = tree.create_root(root_key.public_key().clone()).unwrap();

    // 1. The root zone hangs off a bootstrap key block rather than the root block.
    let key_block = tree
        .add_key(
            AddKey::builder()
                .block(root)
                .key(Keypair::generate().public_key().clone())
                .action(Action::Write)
                .build(),
        )
        .unwrap();
    let root_zone = tree
        .create_zone(CreateChild::builder().sig(sign(&root_key)).block(key_block).build())
        .unwrap();
    assert_eq!(tree.get_root_zone().unwrap(), Some(root_zone));

    // 2. The root zone is found again from storage alone.
    cache.clear();
    assert_eq!(tree.get_root_zone().unwrap(), Some(root_zone));

    // 3. A second zone under the root chain is still rejected after the cache is lost.
    log::debug!("Creating a second zone under the root chain with a cold cache.");
    cache.clear();
    let result = tree.create_zone(CreateChild::builder().sig(sign(&root_key)).block(root).build());
    assert!(matches!(
        result,
        Err(BlocktreeError::InvalidBlock(InvalidBlockError::InvalidParentType {
            found: BlockType::Root,
            block_type: BlockType::Zone,
            ..
        }))
    ));
    assert_eq!(tree.blocktree().count_blocks(), 3);
}
