// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Request/response bodies for the public HTTP surface. Link
//! fields are `cid::Cid`, so JSON serialization via `serde_ipld_dagjson`
//! emits the typed `{"/":"cid"}` shape for every response.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::model::{EventType, Manifest};
use crate::pi::Pi;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub pi: Option<Pi>,
    pub components: BTreeMap<String, Cid>,
    #[serde(default)]
    pub children_pi: Vec<Pi>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct CreateEntityResponse {
    pub pi: Pi,
    pub ver: u64,
    pub cid: Cid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntityRequest {
    pub expect_tip: Cid,
    #[serde(default)]
    pub components_patch: BTreeMap<String, Cid>,
    #[serde(default)]
    pub children_add: Vec<Pi>,
    #[serde(default)]
    pub children_remove: Vec<Pi>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateEntityResponse {
    pub pi: Pi,
    pub ver: u64,
    pub cid: Cid,
}

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub cid: Cid,
    pub manifest: Manifest,
    /// Populated only when `?resolve=bytes` asked for each component's raw
    /// bytes inlined (base64) alongside its link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components_bytes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct GetEntityQuery {
    pub resolve: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub cursor: Option<Cid>,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub items: Vec<crate::tip::VersionSummary>,
    pub next_cursor: Option<Cid>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub cid: Cid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendEventRequest {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub pi: Pi,
    pub ver: u64,
    pub tip_cid: Cid,
}

#[derive(Debug, Serialize)]
pub struct AppendEventResponse {
    pub event_cid: Cid,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub items: Vec<crate::model::EventRecord>,
    pub next_cursor: Option<Cid>,
    pub event_head: Option<Cid>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotRebuildResponse {
    pub status: &'static str,
    pub seq: Option<u64>,
    pub cid: Option<Cid>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotStatusResponse {
    pub building: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub seq: u64,
}

#[derive(Debug, Serialize)]
pub struct IndexPointerResponse {
    #[serde(flatten)]
    pub pointer: crate::model::IndexPointer,
}
