// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::pi::Pi;

use super::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Create,
    Update,
}

/// Immutable DAG node. Events form a global singly-linked chain in reverse
/// chronological order via `prev`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub schema: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub pi: Pi,
    pub ver: u64,
    pub tip_cid: Cid,
    pub ts: DateTime<Utc>,
    pub prev: Option<Cid>,
}

impl Event {
    pub fn new(kind: EventType, pi: Pi, ver: u64, tip_cid: Cid, prev: Option<Cid>, ts: DateTime<Utc>) -> Self {
        Event {
            schema: schema::EVENT.to_string(),
            kind,
            pi,
            ver,
            tip_cid,
            ts,
            prev,
        }
    }

    pub fn has_valid_schema(&self) -> bool {
        schema::accepts(&self.schema, schema::EVENT)
    }
}

/// A single row as returned by `ListEvents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_cid: Cid,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub pi: Pi,
    pub ver: u64,
    pub tip_cid: Cid,
    pub ts: DateTime<Utc>,
}
