// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Append-only Merkle proof over a sorted CID set. Leaves are
//! `SHA256(cid_string)`; an odd node at any level is paired with itself.

use cid::Cid;
use sha2::{Digest, Sha256};

/// Returns the lowercase hex root, or `None` for an empty leaf set.
pub fn root(cids: &[Cid]) -> Option<String> {
    if cids.is_empty() {
        return None;
    }
    let mut sorted: Vec<String> = cids.iter().map(|c| c.to_string()).collect();
    sorted.sort();

    let mut level: Vec<[u8; 32]> = sorted
        .iter()
        .map(|s| Sha256::digest(s.as_bytes()).into())
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(pair[0]);
            hasher.update(pair.get(1).unwrap_or(&pair[0]));
            next.push(hasher.finalize().into());
        }
        level = next;
    }

    Some(hex::encode(level[0]))
}
