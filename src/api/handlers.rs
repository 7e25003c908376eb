// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Handler functions for every route in [`super::router`]. Thin: each one
//! parses its inputs, calls into C2/C3/C4/C5/C6, and maps the result onto a
//! DTO. Error mapping is entirely delegated to `ArkeError`'s `IntoResponse`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, State};
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::error::{ArkeError, ArkeResult};
use crate::events;
use crate::model::{Event, EventType, IndexPointer, Snapshot};
use crate::pi::Pi;
use crate::pointer::IndexPointerStore;
use crate::snapshot;
use crate::store::{BlockStore, Mfs, StoreCodec};
use crate::tip;

use super::dto::*;
use super::json::DagJson;
use super::AppState;

fn parse_pi(raw: &str) -> ArkeResult<Pi> {
    Pi::from_str(raw)
}

pub async fn health() -> DagJson<HealthResponse> {
    DagJson(HealthResponse { status: "healthy" })
}

pub async fn get_index_pointer<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
) -> DagJson<IndexPointerResponse> {
    let pointer: IndexPointer = state.pointer_store.current().await;
    DagJson(IndexPointerResponse { pointer })
}

pub async fn create_entity<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    DagJson(req): DagJson<CreateEntityRequest>,
) -> Result<DagJson<CreateEntityResponse>, ArkeError> {
    let pi = req.pi.unwrap_or_else(Pi::generate);
    let created = tip::create(&*state.store, pi, req.components, req.children_pi, req.note).await?;

    append_under_lock(
        &state.pointer_store,
        &state.store,
        EventType::Create,
        pi,
        created.manifest.ver,
        created.cid,
        true,
    )
    .await?;

    Ok(DagJson(CreateEntityResponse {
        pi,
        ver: created.manifest.ver,
        cid: created.cid,
    }))
}

pub async fn update_entity<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    Path(pi_raw): Path<String>,
    DagJson(req): DagJson<UpdateEntityRequest>,
) -> Result<DagJson<UpdateEntityResponse>, ArkeError> {
    let pi = parse_pi(&pi_raw)?;
    let updated = tip::update(
        &*state.store,
        pi,
        req.expect_tip,
        req.components_patch,
        req.children_add,
        req.children_remove,
        req.note,
    )
    .await?;

    append_under_lock(
        &state.pointer_store,
        &state.store,
        EventType::Update,
        pi,
        updated.manifest.ver,
        updated.cid,
        false,
    )
    .await?;

    Ok(DagJson(UpdateEntityResponse {
        pi,
        ver: updated.manifest.ver,
        cid: updated.cid,
    }))
}

async fn append_under_lock<S: BlockStore + Mfs>(
    pointer_store: &IndexPointerStore,
    store: &S,
    kind: EventType,
    pi: Pi,
    ver: u64,
    cid: cid::Cid,
    is_new_pi: bool,
) -> ArkeResult<cid::Cid> {
    pointer_store
        .with_lock(store, move |p| {
            Box::pin(async move { events::append(store, p, kind, pi, ver, cid, is_new_pi).await })
        })
        .await
}

/// `GET /entities/{pi}?resolve=cids|bytes`. `cids` (the default, also used
/// when the query param is absent) returns the manifest as-is, components
/// as typed links. `bytes` additionally fetches and base64-inlines each
/// component's raw bytes.
pub async fn get_entity<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    Path(pi_raw): Path<String>,
    Query(query): Query<GetEntityQuery>,
) -> Result<DagJson<ManifestResponse>, ArkeError> {
    let pi = parse_pi(&pi_raw)?;
    let cid = tip::resolve(&*state.store, pi).await?;
    let manifest = tip::get_latest(&*state.store, pi).await?;

    let components_bytes = match query.resolve.as_deref() {
        None | Some("cids") => None,
        Some("bytes") => {
            let mut out = BTreeMap::new();
            for (name, component_cid) in &manifest.components {
                let bytes = state.store.get_block(component_cid).await?;
                out.insert(name.clone(), base64::engine::general_purpose::STANDARD.encode(bytes));
            }
            Some(out)
        }
        Some(other) => {
            return Err(ArkeError::Malformed(format!(
                "unknown resolve mode: {other}"
            )))
        }
    };

    Ok(DagJson(ManifestResponse {
        cid,
        manifest,
        components_bytes,
    }))
}

pub async fn resolve<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    Path(pi_raw): Path<String>,
) -> Result<DagJson<ResolveResponse>, ArkeError> {
    let pi = parse_pi(&pi_raw)?;
    let cid = tip::resolve(&*state.store, pi).await?;
    Ok(DagJson(ResolveResponse { cid }))
}

pub async fn list_versions<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    Path(pi_raw): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<DagJson<VersionsResponse>, ArkeError> {
    let pi = parse_pi(&pi_raw)?;
    let limit = page.limit.unwrap_or(50).min(1000);
    let (items, next_cursor) = tip::list_versions(&*state.store, pi, limit, page.cursor).await?;
    Ok(DagJson(VersionsResponse { items, next_cursor }))
}

pub async fn append_event<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    DagJson(req): DagJson<AppendEventRequest>,
) -> Result<DagJson<AppendEventResponse>, ArkeError> {
    let store = &*state.store;
    let event_cid = state
        .pointer_store
        .with_lock(store, move |p| {
            let req = req.clone();
            Box::pin(async move {
                if let Some(head) = p.event_head {
                    let existing: Event = store.get_dag(&head, StoreCodec::DagCbor).await?;
                    if existing.pi == req.pi
                        && existing.ver == req.ver
                        && existing.tip_cid == req.tip_cid
                        && existing.kind == req.kind
                    {
                        return Ok(head);
                    }
                }
                let is_new = matches!(req.kind, EventType::Create);
                events::append(store, p, req.kind, req.pi, req.ver, req.tip_cid, is_new).await
            })
        })
        .await?;
    Ok(DagJson(AppendEventResponse { event_cid }))
}

pub async fn list_events<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
    Query(page): Query<PageQuery>,
) -> Result<DagJson<EventsResponse>, ArkeError> {
    let limit = page.limit.unwrap_or(50).min(1000);
    let pointer = state.pointer_store.current().await;
    let (items, next_cursor) =
        events::list(&*state.store, pointer.event_head, page.cursor, limit).await?;
    Ok(DagJson(EventsResponse {
        items,
        next_cursor,
        event_head: pointer.event_head,
    }))
}

pub async fn snapshot_latest<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
) -> Result<DagJson<Snapshot>, ArkeError> {
    let pointer = state.pointer_store.current().await;
    let cid = pointer
        .latest_snapshot
        .ok_or_else(|| ArkeError::NotFound("no snapshot has been built yet".into()))?;
    let snapshot: Snapshot = state.store.get_dag(&cid, StoreCodec::DagJson).await?;
    if !snapshot.has_valid_schema() {
        return Err(ArkeError::Malformed(format!(
            "unrecognized snapshot schema tag: {}",
            snapshot.schema
        )));
    }
    Ok(DagJson(snapshot))
}

pub async fn snapshot_rebuild<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
) -> Result<DagJson<SnapshotRebuildResponse>, ArkeError> {
    state.snapshot_status.building.store(true, Ordering::SeqCst);
    state
        .snapshot_status
        .started_at_unix
        .store(Utc::now().timestamp() as u64, Ordering::SeqCst);

    let stale_after = std::time::Duration::from_secs(state.config.snapshot.stale_lock_seconds);
    let result = snapshot::build(
        &*state.store,
        &state.pointer_store,
        &state.config.snapshot.lock_path,
        stale_after,
    )
    .await;

    state.snapshot_status.building.store(false, Ordering::SeqCst);

    match result? {
        Some(outcome) => Ok(DagJson(SnapshotRebuildResponse {
            status: "built",
            seq: Some(outcome.snapshot.seq),
            cid: Some(outcome.cid),
        })),
        None => Ok(DagJson(SnapshotRebuildResponse {
            status: "skipped",
            seq: None,
            cid: None,
        })),
    }
}

pub async fn snapshot_status<S: BlockStore + Mfs>(
    State(state): State<AppState<S>>,
) -> DagJson<SnapshotStatusResponse> {
    let pointer = state.pointer_store.current().await;
    let building = state.snapshot_status.building.load(Ordering::SeqCst);
    let started_at = if building {
        DateTime::<Utc>::from_timestamp(
            state.snapshot_status.started_at_unix.load(Ordering::SeqCst) as i64,
            0,
        )
    } else {
        None
    };
    DagJson(SnapshotStatusResponse {
        building,
        started_at,
        seq: pointer.snapshot_seq,
    })
}
