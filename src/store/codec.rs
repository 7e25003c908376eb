// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C9 — codec rules. The single hardest correctness pitfall in this system:
//! a typed link (`LINK(x)`) and a plain map `{"/": "x"}` are byte-different,
//! produce different CIDs, and traverse differently. Only the former is
//! followed by `DAGExport`'s transitive walk.
//!
//! Using `cid::Cid` as the Rust type of every link-valued field (rather than
//! `String`) means `serde_ipld_dagcbor`/`serde_ipld_dagjson` always emit the
//! typed form — there is no runtime switch to get wrong. This module is the
//! conformance check (`Codec.TypedLinkRequired`) that exercises that
//! guarantee against the actual bytes a store would hold.

/// DAG-CBOR tag 42 (the CID tag) is encoded as the two bytes `0xD8 0x2A`
/// immediately before the CID's byte-string body. Counts non-overlapping
/// occurrences of that marker in `bytes`.
pub fn count_typed_link_markers(bytes: &[u8]) -> usize {
    bytes.windows(2).filter(|w| w == b"\xD8\x2A").count()
}

/// `Codec.TypedLinkRequired`: fetching the canonical binary
/// form of a just-stored node must show at least as many typed-link markers
/// as the node has link-valued fields. Returns `Ok(())` when the contract
/// holds, the observed/expected counts otherwise so callers can report a
/// useful failure.
pub fn check_typed_link_conformance(bytes: &[u8], expected_links: usize) -> Result<(), (usize, usize)> {
    let observed = count_typed_link_markers(bytes);
    if observed >= expected_links {
        Ok(())
    } else {
        Err((observed, expected_links))
    }
}
