// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C7 — the in-process scheduler: a periodic snapshot trigger and an
//! orthogonal daily export job, both cooperating with the snapshot lock
//! and honoring graceful shutdown via a cancellation token.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ExportConfig, SnapshotConfig};
use crate::dr;
use crate::pointer::IndexPointerStore;
use crate::snapshot;
use crate::store::{BlockStore, Mfs};

/// Spawns the snapshot-trigger loop. Returns the `JoinHandle`; the caller
/// holds the `CancellationToken` and cancels it on shutdown.
pub fn spawn_snapshot_loop<S>(
    store: Arc<S>,
    pointer_store: Arc<IndexPointerStore>,
    config: SnapshotConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: BlockStore + Mfs + Send + Sync + 'static,
{
    tokio::spawn(async move {
        if config.interval_minutes == 0 {
            info!("snapshot scheduler disabled (interval_minutes=0)");
            return;
        }
        let period = Duration::from_secs(config.interval_minutes * 60);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("snapshot scheduler shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    run_once(&store, &pointer_store, &config).await;
                }
            }
        }
    })
}

async fn run_once<S: BlockStore + Mfs>(
    store: &S,
    pointer_store: &IndexPointerStore,
    config: &SnapshotConfig,
) {
    let stale_after = Duration::from_secs(config.stale_lock_seconds);
    match snapshot::build(store, pointer_store, &config.lock_path, stale_after).await {
        Ok(Some(outcome)) => info!(seq = outcome.snapshot.seq, cid = %outcome.cid, "snapshot built"),
        Ok(None) => info!("snapshot build skipped: no new events"),
        Err(crate::error::ArkeError::LockHeld { started_at }) => {
            warn!(%started_at, "snapshot build already in progress, skipping this tick")
        }
        Err(e) => error!(error = %e, "snapshot build failed"),
    }
}

/// Spawns the daily export loop: exports the latest snapshot's closure to
/// `export.output_dir` as `<seq>.car` with a `<seq>.meta.json` sidecar.
pub fn spawn_export_loop<S>(
    store: Arc<S>,
    pointer_store: Arc<IndexPointerStore>,
    config: ExportConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: BlockStore + Send + Sync + 'static,
{
    tokio::spawn(async move {
        if config.interval_hours == 0 {
            info!("export scheduler disabled (interval_hours=0)");
            return;
        }
        let period = Duration::from_secs(config.interval_hours * 3600);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("export scheduler shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    run_export_once(&store, &pointer_store, &config.output_dir).await;
                }
            }
        }
    })
}

async fn run_export_once<S: BlockStore>(
    store: &S,
    pointer_store: &IndexPointerStore,
    output_dir: &PathBuf,
) {
    let pointer = pointer_store.current().await;
    let Some(scid) = pointer.latest_snapshot else {
        info!("export skipped: no snapshot yet");
        return;
    };

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!(error = %e, "failed to create export output dir");
        return;
    }

    let car_path = dr::archive_path(output_dir, pointer.snapshot_seq);
    let sidecar_path = dr::discover_sidecar_path(output_dir, pointer.snapshot_seq);

    let file = match tokio::fs::File::create(&car_path).await {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, path = %car_path.display(), "failed to create archive file");
            return;
        }
    };
    let mut writer = BufWriter::new(file);

    match dr::export(store, scid, &mut writer).await {
        Ok(sidecar) => {
            if let Ok(bytes) = serde_json::to_vec_pretty(&sidecar) {
                let _ = tokio::fs::write(&sidecar_path, bytes).await;
            }
            info!(seq = sidecar.seq, cid_count = sidecar.cid_count, "export complete");
        }
        Err(e) => error!(error = %e, "export failed"),
    }
}
