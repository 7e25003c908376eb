// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Persistent identifiers (PIs): ULID-shaped, 26 ASCII chars, lexicographically
//! sortable, time-prefixed. Stable for the lifetime of an entity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::ArkeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pi(Ulid);

impl Pi {
    /// Generates a fresh, time-prefixed PI.
    pub fn generate() -> Self {
        Pi(Ulid::new())
    }

    pub fn as_str26(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Pi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Pi {
    type Err = ArkeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 26 {
            return Err(ArkeError::Malformed(format!(
                "PI must be 26 characters, got {}",
                s.len()
            )));
        }
        Ulid::from_str(s)
            .map(Pi)
            .map_err(|e| ArkeError::Malformed(format!("invalid PI {s}: {e}")))
    }
}

/// `shardPath(pi) = "/arke/index/" + pi[0:2] + "/" + pi[2:4] + "/" + pi + ".tip"`
///
/// Sharding by the first four characters distributes PIs across ~65k
/// directories.
pub fn shard_path(pi: &Pi) -> String {
    let s = pi.as_str26();
    format!("/arke/index/{}/{}/{}.tip", &s[0..2], &s[2..4], s)
}

pub fn shard_dir(pi: &Pi) -> String {
    let s = pi.as_str26();
    format!("/arke/index/{}/{}", &s[0..2], &s[2..4])
}
