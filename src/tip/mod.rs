// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Manifest & tip manager. Builds, stores, and chains manifests; each
//! entity's tip pointer lives at a sharded MFS path and is updated under an
//! explicit compare-and-swap. Event emission (which needs the
//! index-pointer mutex) is the caller's job — see [`crate::events::append`].

use std::collections::BTreeMap;

use chrono::Utc;
use cid::Cid;

use crate::error::{ArkeError, ArkeResult};
use crate::model::Manifest;
use crate::pi::{shard_dir, shard_path, Pi};
use crate::store::{BlockStore, Mfs, StoreCodec, StoreError};

/// Outcome of [`create`]: the freshly-minted manifest plus its CID, ready
/// for the caller to fold into an event.
pub struct Created {
    pub manifest: Manifest,
    pub cid: Cid,
}

/// `Create entity (version 1)`. Fails with [`ArkeError::AlreadyExists`]
/// if the tip file exists and is non-empty.
pub async fn create<S: BlockStore + Mfs>(
    store: &S,
    pi: Pi,
    components: BTreeMap<String, Cid>,
    children_pi: Vec<Pi>,
    note: String,
) -> ArkeResult<Created> {
    if store.stat(&shard_path(&pi)).await? {
        return Err(ArkeError::AlreadyExists(pi.to_string()));
    }

    let manifest = Manifest::new_root(pi, components, children_pi, note, Utc::now());
    let cid = store
        .put_dag(&manifest, StoreCodec::DagCbor, true)
        .await?;

    store.mkdir(&shard_dir(&pi)).await?;
    store.write(&shard_path(&pi), cid.to_string().into_bytes(), true).await?;

    Ok(Created { manifest, cid })
}

/// Outcome of [`update`].
pub struct Updated {
    pub manifest: Manifest,
    pub cid: Cid,
    pub prev_cid: Cid,
}

/// `Update entity (new version, CAS)`. Component removal is not
/// supported by the core (merge-only patch semantics, per the Open Question
/// resolved in DESIGN.md).
#[allow(clippy::too_many_arguments)]
pub async fn update<S: BlockStore + Mfs>(
    store: &S,
    pi: Pi,
    expect_tip: Cid,
    components_patch: BTreeMap<String, Cid>,
    children_add: Vec<Pi>,
    children_remove: Vec<Pi>,
    note: Option<String>,
) -> ArkeResult<Updated> {
    let path = shard_path(&pi);
    let cur_bytes = store
        .read(&path)
        .await
        .map_err(|e| map_read_error(e, &pi))?;
    let cur = parse_tip(&cur_bytes)?;

    if cur != expect_tip {
        return Err(ArkeError::Conflict { observed: cur });
    }

    let old: Manifest = store.get_dag(&cur, StoreCodec::DagCbor).await?;
    check_schema(&old)?;

    let mut components = old.components.clone();
    for (k, v) in components_patch {
        components.insert(k, v);
    }

    let mut children_pi = old
        .children_pi
        .iter()
        .filter(|p| !children_remove.contains(p))
        .copied()
        .collect::<Vec<_>>();
    children_pi.extend(children_add);

    let manifest = Manifest {
        schema: old.schema.clone(),
        pi,
        ver: old.ver + 1,
        ts: Utc::now(),
        prev: Some(cur),
        components,
        children_pi,
        note: note.unwrap_or(old.note.clone()),
    };

    let new_cid = store.put_dag(&manifest, StoreCodec::DagCbor, true).await?;
    store.write(&path, new_cid.to_string().into_bytes(), true).await?;
    store.pin_update(cur, new_cid).await?;

    Ok(Updated {
        manifest,
        cid: new_cid,
        prev_cid: cur,
    })
}

/// `Resolve(pi) -> CID`: one MFS read, O(1).
pub async fn resolve<S: BlockStore + Mfs>(store: &S, pi: Pi) -> ArkeResult<Cid> {
    let bytes = store
        .read(&shard_path(&pi))
        .await
        .map_err(|e| map_read_error(e, &pi))?;
    parse_tip(&bytes)
}

/// `GetLatest(pi) -> manifest`: one MFS read + one DAG get.
pub async fn get_latest<S: BlockStore + Mfs>(store: &S, pi: Pi) -> ArkeResult<Manifest> {
    let cid = resolve(store, pi).await?;
    let manifest: Manifest = store.get_dag(&cid, StoreCodec::DagCbor).await?;
    check_schema(&manifest)?;
    Ok(manifest)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionSummary {
    pub cid: Cid,
    pub ver: u64,
    pub ts: chrono::DateTime<Utc>,
    pub note: String,
}

/// `ListVersions(pi, limit, cursor) -> (items, next_cursor)`.
pub async fn list_versions<S: BlockStore + Mfs>(
    store: &S,
    pi: Pi,
    limit: usize,
    cursor: Option<Cid>,
) -> ArkeResult<(Vec<VersionSummary>, Option<Cid>)> {
    let mut cur = match cursor {
        Some(c) => Some(c),
        None => Some(resolve(store, pi).await?),
    };
    let mut out = Vec::with_capacity(limit);
    while let Some(c) = cur {
        if out.len() >= limit {
            break;
        }
        let m: Manifest = store.get_dag(&c, StoreCodec::DagCbor).await?;
        check_schema(&m)?;
        out.push(VersionSummary {
            cid: c,
            ver: m.ver,
            ts: m.ts,
            note: m.note.clone(),
        });
        cur = m.prev;
    }
    Ok((out, cur))
}

/// `GetVersion(pi, ver_or_cid)`: by CID, one DAG get; by version number, walk
/// the chain from tip until `ver` matches.
pub async fn get_version_by_number<S: BlockStore + Mfs>(
    store: &S,
    pi: Pi,
    ver: u64,
) -> ArkeResult<Manifest> {
    let mut cur = Some(resolve(store, pi).await?);
    while let Some(c) = cur {
        let m: Manifest = store.get_dag(&c, StoreCodec::DagCbor).await?;
        check_schema(&m)?;
        if m.ver == ver {
            return Ok(m);
        }
        cur = m.prev;
    }
    Err(ArkeError::NotFound(format!("{pi} version {ver}")))
}

/// Rejects a manifest read back from the store whose `schema` tag isn't one
/// this build recognizes (either spelling of the version suffix).
fn check_schema(m: &Manifest) -> ArkeResult<()> {
    if m.has_valid_schema() {
        Ok(())
    } else {
        Err(ArkeError::Malformed(format!(
            "unrecognized manifest schema tag: {}",
            m.schema
        )))
    }
}

fn parse_tip(bytes: &[u8]) -> ArkeResult<Cid> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| ArkeError::Invariant("tip file is not valid ASCII".into()))?;
    s.parse()
        .map_err(|e: cid::Error| ArkeError::Invariant(format!("tip file does not hold a CID: {e}")))
}

fn map_read_error(e: StoreError, pi: &Pi) -> ArkeError {
    match e {
        StoreError::NotFound(_) => ArkeError::NotFound(pi.to_string()),
        other => other.into(),
    }
}
