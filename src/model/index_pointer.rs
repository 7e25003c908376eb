// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

use super::schema;

/// The single small mutable record naming current event-chain head, latest
/// snapshot, counters, and (implicitly, via [`crate::snapshot::lock`]) a
/// snapshot-build lock. Read-modify-write under a process-level mutex; see
/// [`crate::pointer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPointer {
    pub schema: String,
    pub event_head: Option<Cid>,
    pub event_count: u64,
    pub total_pis: u64,
    pub latest_snapshot: Option<Cid>,
    pub snapshot_seq: u64,
    pub snapshot_ts: Option<DateTime<Utc>>,
    pub last_snapshot_trigger: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl IndexPointer {
    pub fn has_valid_schema(&self) -> bool {
        schema::accepts(&self.schema, schema::INDEX_POINTER)
    }
}

impl Default for IndexPointer {
    fn default() -> Self {
        IndexPointer {
            schema: schema::INDEX_POINTER.to_string(),
            event_head: None,
            event_count: 0,
            total_pis: 0,
            latest_snapshot: None,
            snapshot_seq: 0,
            snapshot_ts: None,
            last_snapshot_trigger: None,
            last_updated: Utc::now(),
        }
    }
}
