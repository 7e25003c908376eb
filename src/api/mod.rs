// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! The public HTTP API surface, built with `axum`. Generic
//! over the block-store implementation so tests can run the whole surface
//! against [`crate::store::memory::MemoryBlockStore`].

pub mod dto;
pub mod error_response;
pub mod handlers;
pub mod json;

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pointer::IndexPointerStore;
use crate::store::{BlockStore, Mfs};

/// Tracked separately from the on-disk lock file so `/snapshot/status` can
/// answer without touching the filesystem (the in-process complement to
/// the 503/Retry-After contract).
#[derive(Default)]
pub struct SnapshotStatus {
    pub building: AtomicBool,
    pub started_at_unix: AtomicU64,
}

pub struct AppState<S> {
    pub store: Arc<S>,
    pub pointer_store: Arc<IndexPointerStore>,
    pub config: Config,
    pub snapshot_status: Arc<SnapshotStatus>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            store: self.store.clone(),
            pointer_store: self.pointer_store.clone(),
            config: self.config.clone(),
            snapshot_status: self.snapshot_status.clone(),
        }
    }
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: BlockStore + Mfs + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(handlers::health))
        .route("/index-pointer", get(handlers::get_index_pointer::<S>))
        .route("/entities", post(handlers::create_entity::<S>))
        .route(
            "/entities/{pi}/versions",
            post(handlers::update_entity::<S>).get(handlers::list_versions::<S>),
        )
        .route("/entities/{pi}", get(handlers::get_entity::<S>))
        .route("/resolve/{pi}", get(handlers::resolve::<S>))
        .route("/events/append", post(handlers::append_event::<S>))
        .route("/events", get(handlers::list_events::<S>))
        .route("/snapshot/latest", get(handlers::snapshot_latest::<S>))
        .route("/snapshot/rebuild", post(handlers::snapshot_rebuild::<S>))
        .route("/snapshot/status", get(handlers::snapshot_status::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
