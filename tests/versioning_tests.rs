// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C2 properties: CAS create/update, conflict detection, version history.

use std::collections::BTreeMap;

use arke::error::ArkeError;
use arke::pi::Pi;
use arke::store::memory::MemoryBlockStore;
use arke::tip;

fn dummy_component(store: &MemoryBlockStore, seed: u8) -> cid::Cid {
    let seed_str = format!("component-{seed}");
    store.insert_raw(
        cid::Cid::new_v1(
            0x55,
            cid::multihash::Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap(),
        ),
        seed_str.into_bytes(),
    );
    cid::Cid::new_v1(
        0x55,
        cid::multihash::Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap(),
    )
}

#[tokio::test]
async fn create_then_read_back_latest() {
    let store = MemoryBlockStore::new();
    let mut components = BTreeMap::new();
    components.insert("body".to_string(), dummy_component(&store, 1));

    let created = tip::create(&store, Pi::generate(), components.clone(), vec![], "v1".into())
        .await
        .unwrap();
    assert_eq!(created.manifest.ver, 1);
    assert!(created.manifest.prev.is_none());

    let resolved = tip::resolve(&store, created.manifest.pi).await.unwrap();
    assert_eq!(resolved, created.cid);

    let latest = tip::get_latest(&store, created.manifest.pi).await.unwrap();
    assert_eq!(latest, created.manifest);
}

#[tokio::test]
async fn create_twice_on_same_pi_fails_already_exists() {
    let store = MemoryBlockStore::new();
    let pi = Pi::generate();
    tip::create(&store, pi, BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();

    let second = tip::create(&store, pi, BTreeMap::new(), vec![], String::new()).await;
    assert!(matches!(second, Err(ArkeError::AlreadyExists(_))));
}

#[tokio::test]
async fn update_with_stale_expect_tip_is_rejected() {
    let store = MemoryBlockStore::new();
    let created = tip::create(&store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();

    let stale = cid::Cid::new_v1(
        0x71,
        cid::multihash::Multihash::<64>::wrap(0x12, &[9; 32]).unwrap(),
    );
    let err = tip::update(
        &store,
        created.manifest.pi,
        stale,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await;

    match err {
        Err(ArkeError::Conflict { observed }) => assert_eq!(observed, created.cid),
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn update_merges_components_and_bumps_version() {
    let store = MemoryBlockStore::new();
    let mut components = BTreeMap::new();
    components.insert("body".to_string(), dummy_component(&store, 1));
    let created = tip::create(&store, Pi::generate(), components, vec![], String::new())
        .await
        .unwrap();

    let mut patch = BTreeMap::new();
    patch.insert("thumbnail".to_string(), dummy_component(&store, 2));

    let updated = tip::update(
        &store,
        created.manifest.pi,
        created.cid,
        patch,
        vec![],
        vec![],
        Some("v2".into()),
    )
    .await
    .unwrap();

    assert_eq!(updated.manifest.ver, 2);
    assert_eq!(updated.manifest.prev, Some(created.cid));
    assert_eq!(updated.manifest.components.len(), 2);
    assert!(updated.manifest.components.contains_key("body"));
    assert!(updated.manifest.components.contains_key("thumbnail"));

    let resolved = tip::resolve(&store, created.manifest.pi).await.unwrap();
    assert_eq!(resolved, updated.cid);
}

#[tokio::test]
async fn two_racing_updates_only_one_wins() {
    let store = MemoryBlockStore::new();
    let created = tip::create(&store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();

    let first = tip::update(
        &store,
        created.manifest.pi,
        created.cid,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await
    .unwrap();

    let second = tip::update(
        &store,
        created.manifest.pi,
        created.cid,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await;

    assert!(first.manifest.ver == 2);
    match second {
        Err(ArkeError::Conflict { observed }) => assert_eq!(observed, created.cid),
        other => panic!("expected the loser to see a Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn list_versions_walks_newest_first_and_paginates() {
    let store = MemoryBlockStore::new();
    let created = tip::create(&store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();
    let v2 = tip::update(
        &store,
        created.manifest.pi,
        created.cid,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await
    .unwrap();
    let v3 = tip::update(
        &store,
        created.manifest.pi,
        v2.cid,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await
    .unwrap();

    let (page, next) = tip::list_versions(&store, created.manifest.pi, 2, None)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].cid, v3.cid);
    assert_eq!(page[1].cid, v2.cid);
    assert_eq!(next, Some(created.cid));

    let (rest, next2) = tip::list_versions(&store, created.manifest.pi, 2, next)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].cid, created.cid);
    assert!(next2.is_none());
}

#[tokio::test]
async fn unknown_pi_resolves_to_not_found() {
    let store = MemoryBlockStore::new();
    let err = tip::resolve(&store, Pi::generate()).await;
    assert!(matches!(err, Err(ArkeError::NotFound(_))));
}

#[tokio::test]
async fn create_pins_the_new_manifest() {
    let store = MemoryBlockStore::new();
    let created = tip::create(&store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();

    assert!(store.pinned().contains(&created.cid));
}

#[tokio::test]
async fn update_atomically_swaps_the_pin_from_old_tip_to_new() {
    let store = MemoryBlockStore::new();
    let created = tip::create(&store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();
    assert!(store.pinned().contains(&created.cid));

    let updated = tip::update(
        &store,
        created.manifest.pi,
        created.cid,
        BTreeMap::new(),
        vec![],
        vec![],
        None,
    )
    .await
    .unwrap();

    let pins = store.pinned();
    assert!(!pins.contains(&created.cid));
    assert!(pins.contains(&updated.cid));
}
