// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C5 properties: skip condition, full fold correctness, incremental fold
//! correctness, Merkle root determinism, append-only consistency stats.

use std::collections::BTreeMap;
use std::time::Duration;

use arke::model::EventType;
use arke::pi::Pi;
use arke::pointer::IndexPointerStore;
use arke::snapshot;
use arke::store::memory::MemoryBlockStore;
use arke::{events, tip};

async fn create_and_record(
    store: &MemoryBlockStore,
    pointer_store: &IndexPointerStore,
) -> Pi {
    let created = tip::create(store, Pi::generate(), BTreeMap::new(), vec![], String::new())
        .await
        .unwrap();
    let pi = created.manifest.pi;
    pointer_store
        .with_lock(store, |p| {
            let cid = created.cid;
            Box::pin(async move {
                events::append(store, p, EventType::Create, pi, 1, cid, true).await
            })
        })
        .await
        .unwrap();
    pi
}

#[tokio::test]
async fn build_with_no_events_is_a_noop() {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("snapshot.lock");

    let outcome = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn full_build_covers_every_entity_and_is_append_only() {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("snapshot.lock");

    let mut pis = Vec::new();
    for _ in 0..3 {
        pis.push(create_and_record(&store, &pointer_store).await);
    }

    let outcome = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap()
        .expect("first build should produce a snapshot");

    assert_eq!(outcome.snapshot.seq, 1);
    assert_eq!(outcome.snapshot.total_count, 3);
    assert!(outcome.snapshot.is_sorted());
    assert!(outcome.snapshot.merkle_root.is_some());

    let consistency = outcome.snapshot.consistency.unwrap();
    assert_eq!(consistency.added_count, consistency.curr_cid_count);
    assert_eq!(consistency.deleted_count, 0);
    assert!(consistency.is_append_only);

    let entry_pis: Vec<Pi> = outcome.snapshot.entries.iter().map(|e| e.pi).collect();
    for pi in &pis {
        assert!(entry_pis.contains(pi));
    }

    let pointer = pointer_store.current().await;
    assert_eq!(pointer.latest_snapshot, Some(outcome.cid));
    assert_eq!(pointer.snapshot_seq, 1);
}

#[tokio::test]
async fn second_build_with_no_new_events_is_skipped() {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("snapshot.lock");

    create_and_record(&store, &pointer_store).await;
    snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap()
        .expect("first build should run");

    let second = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn incremental_build_merges_with_previous_entries() {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("snapshot.lock");

    let first_pi = create_and_record(&store, &pointer_store).await;
    let first = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    let second_pi = create_and_record(&store, &pointer_store).await;
    let second = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap()
        .expect("second build should run after new events");

    assert_eq!(second.snapshot.seq, 2);
    assert_eq!(second.snapshot.total_count, 2);
    let entry_pis: Vec<Pi> = second.snapshot.entries.iter().map(|e| e.pi).collect();
    assert!(entry_pis.contains(&first_pi));
    assert!(entry_pis.contains(&second_pi));

    let consistency = second.snapshot.consistency.unwrap();
    assert_eq!(consistency.deleted_count, 0);
    assert!(consistency.curr_cid_count > first.snapshot.consistency.unwrap().curr_cid_count);
}

#[tokio::test]
async fn snapshot_entries_are_sorted_ascending_by_pi() {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("snapshot.lock");

    for _ in 0..5 {
        create_and_record(&store, &pointer_store).await;
    }

    let outcome = snapshot::build(&store, &pointer_store, &lock_path, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.snapshot.is_sorted());
}
