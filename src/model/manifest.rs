// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::pi::Pi;

use super::schema;

/// Immutable record describing one version of one entity.
///
/// Link-valued fields (`prev`, `components`) are typed `Cid`, never `String`
/// — this is what makes the typed-link contract a property of
/// the type system rather than something callers can forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema: String,
    pub pi: Pi,
    pub ver: u64,
    pub ts: DateTime<Utc>,
    pub prev: Option<Cid>,
    pub components: BTreeMap<String, Cid>,
    #[serde(default)]
    pub children_pi: Vec<Pi>,
    #[serde(default)]
    pub note: String,
}

impl Manifest {
    pub fn new_root(
        pi: Pi,
        components: BTreeMap<String, Cid>,
        children_pi: Vec<Pi>,
        note: String,
        ts: DateTime<Utc>,
    ) -> Self {
        Manifest {
            schema: schema::MANIFEST.to_string(),
            pi,
            ver: 1,
            ts,
            prev: None,
            components,
            children_pi,
            note,
        }
    }

    /// Checks the invariant: `ver == 1` iff `prev == None`.
    pub fn is_well_formed(&self) -> bool {
        (self.ver == 1) == self.prev.is_none()
    }

    pub fn has_valid_schema(&self) -> bool {
        schema::accepts(&self.schema, schema::MANIFEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_manifest_has_no_prev() {
        let m = Manifest::new_root(Pi::generate(), BTreeMap::new(), vec![], String::new(), Utc::now());
        assert!(m.is_well_formed());
        assert_eq!(m.ver, 1);
        assert!(m.prev.is_none());
    }
}
