// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C5 — the snapshot builder. Folds the event chain into a deduplicated,
//! point-in-time index of `(pi -> latest manifest, latest event)`, full or
//! incremental against a previous snapshot, and commits the result alongside
//! an append-only Merkle proof over the transitive CID closure.

pub mod lock;
pub mod merkle;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use cid::Cid;

use crate::error::ArkeResult;
use crate::model::{Consistency, Event, Manifest, Snapshot, SnapshotEntry};
use crate::pointer::IndexPointerStore;
use crate::store::{BlockStore, StoreCodec};

use lock::SnapshotLock;

pub struct BuildOutcome {
    pub cid: Cid,
    pub snapshot: Snapshot,
}

/// Runs one snapshot build cycle: acquires the file lock, checks the skip
/// condition, folds entries, computes the Merkle proof, stores the
/// snapshot, and RMWs the index pointer. Returns `Ok(None)` on the no-op
/// skip path.
pub async fn build<S: BlockStore>(
    store: &S,
    pointer_store: &IndexPointerStore,
    lock_path: &Path,
    stale_after: Duration,
) -> ArkeResult<Option<BuildOutcome>> {
    let guard = SnapshotLock::acquire(lock_path, stale_after)?;

    let outcome = run_fold(store, pointer_store).await;

    // Best-effort: release even on error so the next scheduled run isn't
    // blocked by a lock we still hold.
    let _ = guard.release();

    outcome
}

async fn run_fold<S: BlockStore>(
    store: &S,
    pointer_store: &IndexPointerStore,
) -> ArkeResult<Option<BuildOutcome>> {
    let pointer = pointer_store.current().await;

    let Some(event_head) = pointer.event_head else {
        return Ok(None);
    };

    let prev_snapshot: Option<Snapshot> = match pointer.latest_snapshot {
        Some(scid) => {
            let s: Snapshot = store.get_dag(&scid, StoreCodec::DagJson).await?;
            if !s.has_valid_schema() {
                return Err(crate::error::ArkeError::Malformed(format!(
                    "unrecognized snapshot schema tag: {}",
                    s.schema
                )));
            }
            Some(s)
        }
        None => None,
    };

    if let Some(prev) = &prev_snapshot {
        if prev.event_cid == Some(event_head) {
            return Ok(None);
        }
    }

    let (entries, changed_pis) = fold_entries(store, event_head, prev_snapshot.as_ref()).await?;

    let all_cids = compute_closure(store, &entries, &changed_pis, prev_snapshot.as_ref()).await?;

    let merkle_root = merkle::root(&all_cids);
    let prev_cid_count = prev_snapshot
        .as_ref()
        .and_then(|p| p.all_cids.as_ref())
        .map(|c| c.len() as u64)
        .unwrap_or(0);
    let curr_cid_count = all_cids.len() as u64;

    let prev_set: HashSet<Cid> = prev_snapshot
        .as_ref()
        .and_then(|p| p.all_cids.as_ref())
        .map(|c| c.iter().copied().collect())
        .unwrap_or_default();
    let curr_set: HashSet<Cid> = all_cids.iter().copied().collect();
    let added_count = curr_set.difference(&prev_set).count() as u64;
    let deleted_count = prev_set.difference(&curr_set).count() as u64;

    let seq = pointer.snapshot_seq + 1;
    let snapshot = Snapshot {
        schema: crate::model::schema::SNAPSHOT.to_string(),
        seq,
        ts: Utc::now(),
        event_cid: Some(event_head),
        total_count: entries.len() as u64,
        prev_snapshot: pointer.latest_snapshot,
        entries: entries.into_values().collect(),
        merkle_root,
        cid_count: Some(curr_cid_count),
        all_cids: Some(all_cids),
        consistency: Some(Consistency {
            prev_cid_count,
            curr_cid_count,
            added_count,
            deleted_count,
            is_append_only: deleted_count == 0,
        }),
    };

    let cid = store.put_dag(&snapshot, StoreCodec::DagJson, true).await?;

    pointer_store
        .with_lock(store, |p| {
            let scid = cid;
            let seq = seq;
            Box::pin(async move {
                p.latest_snapshot = Some(scid);
                p.snapshot_seq = seq;
                p.snapshot_ts = Some(Utc::now());
                Ok(())
            })
        })
        .await?;

    Ok(Some(BuildOutcome { cid, snapshot }))
}

/// Full or incremental fold. Returns the merged entry map
/// (ascending by PI, since `Pi: Ord`) and the set of PIs that are new or
/// changed in this build — the only ones whose closures need re-walking.
async fn fold_entries<S: BlockStore>(
    store: &S,
    event_head: Cid,
    prev_snapshot: Option<&Snapshot>,
) -> ArkeResult<(BTreeMap<crate::pi::Pi, SnapshotEntry>, HashSet<crate::pi::Pi>)> {
    let mut entries: BTreeMap<crate::pi::Pi, SnapshotEntry> = BTreeMap::new();
    if let Some(prev) = prev_snapshot {
        for e in &prev.entries {
            entries.insert(e.pi, e.clone());
        }
    }

    let stop_at = prev_snapshot.and_then(|p| p.event_cid);

    let mut seen_this_walk: HashSet<crate::pi::Pi> = HashSet::new();
    let mut changed = HashSet::new();
    let mut cur = Some(event_head);
    while let Some(ecid) = cur {
        if Some(ecid) == stop_at {
            break;
        }
        let event: Event = store.get_dag(&ecid, StoreCodec::DagCbor).await?;
        if !event.has_valid_schema() {
            return Err(crate::error::ArkeError::Malformed(format!(
                "unrecognized event schema tag: {}",
                event.schema
            )));
        }
        if seen_this_walk.insert(event.pi) {
            entries.insert(
                event.pi,
                SnapshotEntry {
                    pi: event.pi,
                    ver: event.ver,
                    tip_cid: event.tip_cid,
                    chain_cid: ecid,
                    ts: event.ts,
                },
            );
            changed.insert(event.pi);
        }
        cur = event.prev;
    }

    Ok((entries, changed))
}

/// Transitive-closure CID set for the append-only proof. Incremental
/// builds only re-walk `changed` entries' closures, unioning with the
/// previous snapshot's `all_cids`.
async fn compute_closure<S: BlockStore>(
    store: &S,
    entries: &BTreeMap<crate::pi::Pi, SnapshotEntry>,
    changed: &HashSet<crate::pi::Pi>,
    prev_snapshot: Option<&Snapshot>,
) -> ArkeResult<Vec<Cid>> {
    let mut closure: HashSet<Cid> = prev_snapshot
        .and_then(|p| p.all_cids.as_ref())
        .map(|c| c.iter().copied().collect())
        .unwrap_or_default();

    for pi in changed {
        let Some(entry) = entries.get(pi) else { continue };

        let mut mcid = Some(entry.tip_cid);
        while let Some(cid) = mcid {
            if !closure.insert(cid) {
                break;
            }
            let manifest: Manifest = store.get_dag(&cid, StoreCodec::DagCbor).await?;
            if !manifest.has_valid_schema() {
                return Err(crate::error::ArkeError::Malformed(format!(
                    "unrecognized manifest schema tag: {}",
                    manifest.schema
                )));
            }
            for component_cid in manifest.components.values() {
                closure.insert(*component_cid);
            }
            mcid = manifest.prev;
        }

        let mut ecid = Some(entry.chain_cid);
        while let Some(cid) = ecid {
            if !closure.insert(cid) {
                break;
            }
            let event: Event = store.get_dag(&cid, StoreCodec::DagCbor).await?;
            if !event.has_valid_schema() {
                return Err(crate::error::ArkeError::Malformed(format!(
                    "unrecognized event schema tag: {}",
                    event.schema
                )));
            }
            ecid = event.prev;
        }
    }

    let mut out: Vec<Cid> = closure.into_iter().collect();
    out.sort_by_key(|c| c.to_string());
    Ok(out)
}

pub fn default_stale_after(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
