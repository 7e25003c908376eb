// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C6 — disaster recovery: export a snapshot's transitive closure to a
//! portable archive and import it onto a blank store, rebuilding tips and
//! the index pointer from the snapshot alone.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ArkeResult;
use crate::model::{Event, Manifest, Snapshot};
use crate::pi::{shard_dir, shard_path, Pi};
use crate::pointer::IndexPointerStore;
use crate::store::car::{read_car, write_car};
use crate::store::{BlockStore, Mfs, StoreCodec};

/// Sidecar record written alongside the `.car` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub snapshot_cid: Cid,
    pub cid_count: usize,
    pub manifest_count: usize,
    pub event_count: usize,
    pub component_count: usize,
}

/// Fetches the closure reachable from `snapshot_cid` (snapshot, every
/// manifest/component in each entry's version history, every event in its
/// chain history) and streams it as an archive to `writer`. Pins every CID
/// first, belt-and-braces against a concurrent store GC.
pub async fn export<S: BlockStore, W: AsyncWrite + Send + Unpin>(
    store: &S,
    snapshot_cid: Cid,
    writer: &mut W,
) -> ArkeResult<ExportManifest> {
    let snapshot: Snapshot = store.get_dag(&snapshot_cid, StoreCodec::DagJson).await?;
    check_snapshot_schema(&snapshot)?;

    let mut seen: HashSet<Cid> = HashSet::new();
    let mut blocks: Vec<(Cid, Vec<u8>)> = Vec::new();
    let mut manifest_count = 0usize;
    let mut event_count = 0usize;
    let mut component_count = 0usize;

    let snapshot_bytes = store.get_block(&snapshot_cid).await?;
    seen.insert(snapshot_cid);
    blocks.push((snapshot_cid, snapshot_bytes));

    for entry in &snapshot.entries {
        let mut mcid = Some(entry.tip_cid);
        while let Some(cid) = mcid {
            if !seen.insert(cid) {
                break;
            }
            let bytes = store.get_block(&cid).await?;
            let manifest: Manifest = store.get_dag(&cid, StoreCodec::DagCbor).await?;
            if !manifest.has_valid_schema() {
                return Err(crate::error::ArkeError::Malformed(format!(
                    "unrecognized manifest schema tag: {}",
                    manifest.schema
                )));
            }
            manifest_count += 1;
            for component_cid in manifest.components.values() {
                if seen.insert(*component_cid) {
                    let cbytes = store.get_block(component_cid).await?;
                    blocks.push((*component_cid, cbytes));
                    component_count += 1;
                }
            }
            blocks.push((cid, bytes));
            mcid = manifest.prev;
        }

        let mut ecid = Some(entry.chain_cid);
        while let Some(cid) = ecid {
            if !seen.insert(cid) {
                break;
            }
            let bytes = store.get_block(&cid).await?;
            let event: Event = store.get_dag(&cid, StoreCodec::DagCbor).await?;
            if !event.has_valid_schema() {
                return Err(crate::error::ArkeError::Malformed(format!(
                    "unrecognized event schema tag: {}",
                    event.schema
                )));
            }
            event_count += 1;
            blocks.push((cid, bytes));
            ecid = event.prev;
        }
    }

    for cid in &seen {
        store.pin_add(*cid).await?;
    }

    write_car(writer, vec![snapshot_cid], blocks).await?;

    Ok(ExportManifest {
        seq: snapshot.seq,
        ts: Utc::now(),
        snapshot_cid,
        cid_count: seen.len(),
        manifest_count,
        event_count,
        component_count,
    })
}

/// Outcome of [`import`].
pub struct ImportStats {
    pub snapshot_cid: Cid,
    pub entries_restored: usize,
    pub blocks_ingested: usize,
}

/// Ingests an archive, rebuilds every tip file named by the snapshot's
/// entries, and reconstructs the index pointer. Idempotent: running twice
/// against the same store is a no-op the second time.
pub async fn import<S, R>(
    store: &S,
    pointer_store: &IndexPointerStore,
    mut reader: R,
) -> ArkeResult<ImportStats>
where
    S: BlockStore + Mfs,
    R: AsyncRead + Send + Unpin,
{
    let mut archive = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut archive)
        .await
        .map_err(|e| crate::error::ArkeError::Malformed(format!("reading archive: {e}")))?;

    let (roots, blocks) = read_car(std::io::Cursor::new(&archive)).await?;
    let snapshot_cid = *roots
        .first()
        .ok_or_else(|| crate::error::ArkeError::Malformed("archive has no root CID".into()))?;
    let blocks_ingested = blocks.len();

    store.dag_import(archive).await?;

    let snapshot: Snapshot = store.get_dag(&snapshot_cid, StoreCodec::DagJson).await?;
    check_snapshot_schema(&snapshot)?;

    for entry in &snapshot.entries {
        store.mkdir(&shard_dir(&entry.pi)).await?;
        store
            .write(&shard_path(&entry.pi), entry.tip_cid.to_string().into_bytes(), true)
            .await?;
        store.pin_add(entry.tip_cid).await?;
    }

    pointer_store
        .with_lock(store, |p| {
            let snapshot = snapshot.clone();
            Box::pin(async move {
                p.event_head = snapshot.event_cid;
                p.event_count = 0;
                p.total_pis = snapshot.total_count;
                p.latest_snapshot = Some(snapshot_cid);
                p.snapshot_seq = snapshot.seq;
                p.snapshot_ts = Some(snapshot.ts);
                Ok(())
            })
        })
        .await?;

    for entry in &snapshot.entries {
        let observed = crate::tip::resolve(store, entry.pi).await?;
        if observed != entry.tip_cid {
            return Err(crate::error::ArkeError::invariant(format!(
                "import verification failed for {}: expected {}, observed {}",
                entry.pi, entry.tip_cid, observed
            )));
        }
    }

    Ok(ImportStats {
        snapshot_cid,
        entries_restored: snapshot.entries.len(),
        blocks_ingested,
    })
}

/// Rejects a snapshot read back from the store whose `schema` tag isn't one
/// this build recognizes.
fn check_snapshot_schema(s: &Snapshot) -> ArkeResult<()> {
    if s.has_valid_schema() {
        Ok(())
    } else {
        Err(crate::error::ArkeError::Malformed(format!(
            "unrecognized snapshot schema tag: {}",
            s.schema
        )))
    }
}

pub fn discover_sidecar_path(output_dir: &std::path::Path, seq: u64) -> std::path::PathBuf {
    output_dir.join(format!("{seq}.meta.json"))
}

pub fn archive_path(output_dir: &std::path::Path, seq: u64) -> std::path::PathBuf {
    output_dir.join(format!("{seq}.car"))
}
