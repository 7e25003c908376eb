// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::pi::Pi;

use super::schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub pi: Pi,
    pub ver: u64,
    pub tip_cid: Cid,
    pub chain_cid: Cid,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Consistency {
    pub prev_cid_count: u64,
    pub curr_cid_count: u64,
    pub added_count: u64,
    pub deleted_count: u64,
    pub is_append_only: bool,
}

/// Immutable DAG node; the deduplicated fold of the event chain at a given
/// moment. Stored with the typed-JSON codec rather than
/// typed-binary, because some archive-walker tools historically ignore
/// typed-binary links inside root nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: String,
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub event_cid: Option<Cid>,
    pub total_count: u64,
    pub prev_snapshot: Option<Cid>,
    pub entries: Vec<SnapshotEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_cids: Option<Vec<Cid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
}

impl Snapshot {
    /// Invariant: entries sorted ascending by PI, one per
    /// distinct PI ever seen.
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].pi < w[1].pi)
    }

    pub fn has_valid_schema(&self) -> bool {
        schema::accepts(&self.schema, schema::SNAPSHOT)
    }
}
