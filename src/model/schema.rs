// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Schema-tag helpers.
//!
//! The source archive this system descends from mixes `arke/manifest/v1` and
//! `arke/manifest@v1` style tags. We accept both spellings on read and only
//! ever emit the canonical `@v1` form on write.

/// Checks a schema tag read from the wire against `expected` (one of the
/// `MANIFEST`/`EVENT`/`SNAPSHOT`/`INDEX_POINTER` constants below), accepting
/// the legacy `/`-separated spelling alongside the canonical `@`-separated
/// one.
pub fn accepts(tag: &str, expected: &str) -> bool {
    if tag == expected {
        return true;
    }
    match expected.split_once('@') {
        Some((base, ver)) => tag == format!("{base}/{ver}"),
        None => false,
    }
}

pub const MANIFEST: &str = "arke/manifest@v1";
pub const EVENT: &str = "arke/event@v1";
pub const SNAPSHOT: &str = "arke/snapshot@v1";
pub const INDEX_POINTER: &str = "arke/index-pointer@v2";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_separators() {
        assert!(accepts("arke/manifest@v1", "arke/manifest"));
        assert!(accepts("arke/manifest/v1", "arke/manifest"));
        assert!(!accepts("arke/manifest@v2", "arke/manifest"));
    }
}
