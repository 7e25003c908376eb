// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

mod cli;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use arke::api::{router, AppState, SnapshotStatus};
use arke::config::Config;
use arke::pointer::IndexPointerStore;
use arke::store::http::HttpBlockStore;
use arke::{dr, logger, scheduler, snapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    logger::init(config.log_format);

    let store = Arc::new(HttpBlockStore::new(
        config.store.base_url.clone(),
        config.retry,
    ));

    match cli.command {
        cli::Command::Serve => serve(store, config).await,
        cli::Command::SnapshotRebuild => snapshot_rebuild(store, config).await,
        cli::Command::Export { output_dir } => export(store, config, output_dir).await,
        cli::Command::Import { archive } => import(store, config, archive).await,
    }
}

async fn serve(store: Arc<HttpBlockStore>, config: Config) -> anyhow::Result<()> {
    let pointer_store = Arc::new(
        IndexPointerStore::load(&*store)
            .await
            .context("loading index pointer")?,
    );

    let state = AppState {
        store: store.clone(),
        pointer_store: pointer_store.clone(),
        config: config.clone(),
        snapshot_status: Arc::new(SnapshotStatus {
            building: AtomicBool::new(false),
            ..Default::default()
        }),
    };

    let cancel = CancellationToken::new();
    let snapshot_handle = scheduler::spawn_snapshot_loop(
        store.clone(),
        pointer_store.clone(),
        config.snapshot.clone(),
        cancel.clone(),
    );
    let export_handle = scheduler::spawn_export_loop(
        store.clone(),
        pointer_store.clone(),
        config.export.clone(),
        cancel.clone(),
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.http.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.http.listen_addr))?;

    tracing::info!(addr = %config.http.listen_addr, "arke listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    cancel.cancel();
    let _ = snapshot_handle.await;
    let _ = export_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("installing ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

async fn snapshot_rebuild(store: Arc<HttpBlockStore>, config: Config) -> anyhow::Result<()> {
    let pointer_store = IndexPointerStore::load(&*store).await?;
    let stale_after = std::time::Duration::from_secs(config.snapshot.stale_lock_seconds);
    match snapshot::build(&*store, &pointer_store, &config.snapshot.lock_path, stale_after).await? {
        Some(outcome) => println!("snapshot {} built: {}", outcome.snapshot.seq, outcome.cid),
        None => println!("snapshot build skipped: no new events"),
    }
    Ok(())
}

async fn export(
    store: Arc<HttpBlockStore>,
    config: Config,
    output_dir: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let pointer_store = IndexPointerStore::load(&*store).await?;
    let pointer = pointer_store.current().await;
    let scid = pointer
        .latest_snapshot
        .context("no snapshot has been built yet")?;

    let output_dir = output_dir.unwrap_or(config.export.output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let car_path = dr::archive_path(&output_dir, pointer.snapshot_seq);
    let sidecar_path = dr::discover_sidecar_path(&output_dir, pointer.snapshot_seq);

    let file = tokio::fs::File::create(&car_path).await?;
    let mut writer = tokio::io::BufWriter::new(file);
    let sidecar = dr::export(&*store, scid, &mut writer).await?;
    tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&sidecar)?).await?;

    println!("exported snapshot {} to {}", sidecar.seq, car_path.display());
    Ok(())
}

async fn import(
    store: Arc<HttpBlockStore>,
    _config: Config,
    archive: std::path::PathBuf,
) -> anyhow::Result<()> {
    let pointer_store = IndexPointerStore::load(&*store).await?;
    let file = tokio::fs::File::open(&archive).await?;
    let stats = dr::import(&*store, &pointer_store, file).await?;
    println!(
        "imported snapshot {}: {} entries restored, {} blocks ingested",
        stats.snapshot_cid, stats.entries_restored, stats.blocks_ingested
    );
    Ok(())
}
