// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-memory [`BlockStore`]/[`Mfs`] used by unit and integration tests.
//! Never used in production — the real store is an external process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cid::multihash::Multihash;
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{BlockStore, Mfs, StoreCodec, StoreError, StoreResult};

const RAW_CODEC: u64 = 0x55;
const DAG_CBOR_CODEC: u64 = 0x71;
const DAG_JSON_CODEC: u64 = 0x0129;

#[derive(Default)]
struct Inner {
    blocks: HashMap<Cid, Vec<u8>>,
    pins: HashSet<Cid>,
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    inner: Arc<RwLock<Inner>>,
}

fn cid_for(bytes: &[u8], codec: u64) -> Cid {
    let digest: Multihash<64> = Code::Sha2_256.digest(bytes);
    Cid::new_v1(codec, digest)
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pinned(&self) -> HashSet<Cid> {
        self.inner.read().pins.clone()
    }

    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.inner.read().blocks.contains_key(cid)
    }

    /// Test/DR-import helper: inserts a block with a caller-supplied CID,
    /// bypassing hashing (used by `DAGImport`, which trusts the archive).
    pub fn insert_raw(&self, cid: Cid, bytes: Vec<u8>) {
        self.inner.write().blocks.insert(cid, bytes);
    }

    pub fn all_blocks(&self) -> Vec<(Cid, Vec<u8>)> {
        self.inner
            .read()
            .blocks
            .iter()
            .map(|(c, b)| (*c, b.clone()))
            .collect()
    }
}

impl BlockStore for MemoryBlockStore {
    async fn put_dag<T>(&self, node: &T, codec: StoreCodec, pin: bool) -> StoreResult<Cid>
    where
        T: Serialize + Sync,
    {
        let (bytes, ipld_codec) = match codec {
            StoreCodec::DagCbor => (
                serde_ipld_dagcbor::to_vec(node).map_err(|e| StoreError::Encode(e.to_string()))?,
                DAG_CBOR_CODEC,
            ),
            StoreCodec::DagJson => (
                serde_ipld_dagjson::to_vec(node).map_err(|e| StoreError::Encode(e.to_string()))?,
                DAG_JSON_CODEC,
            ),
        };
        let cid = cid_for(&bytes, ipld_codec);
        let mut inner = self.inner.write();
        inner.blocks.insert(cid, bytes);
        if pin {
            inner.pins.insert(cid);
        }
        Ok(cid)
    }

    async fn get_dag<T>(&self, cid: &Cid, codec: StoreCodec) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.get_block(cid).await?;
        match codec {
            StoreCodec::DagCbor => {
                serde_ipld_dagcbor::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
            }
            StoreCodec::DagJson => {
                serde_ipld_dagjson::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
            }
        }
    }

    async fn get_block(&self, cid: &Cid) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .blocks
            .get(cid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(cid.to_string()))
    }

    async fn add_bytes(&self, bytes: Vec<u8>, pin: bool) -> StoreResult<Cid> {
        let cid = cid_for(&bytes, RAW_CODEC);
        let mut inner = self.inner.write();
        inner.blocks.insert(cid, bytes);
        if pin {
            inner.pins.insert(cid);
        }
        Ok(cid)
    }

    async fn pin_add(&self, cid: Cid) -> StoreResult<()> {
        self.inner.write().pins.insert(cid);
        Ok(())
    }

    async fn pin_rm(&self, cid: Cid) -> StoreResult<()> {
        self.inner.write().pins.remove(&cid);
        Ok(())
    }

    async fn pin_update(&self, old: Cid, new: Cid) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.pins.remove(&old);
        inner.pins.insert(new);
        Ok(())
    }

    async fn dag_import(&self, archive: Vec<u8>) -> StoreResult<()> {
        let (_roots, blocks) = super::car::read_car(std::io::Cursor::new(archive))
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let mut inner = self.inner.write();
        for (cid, bytes) in blocks {
            inner.blocks.insert(cid, bytes);
        }
        Ok(())
    }
}

impl Mfs for MemoryBlockStore {
    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .files
            .get(path)
            .cloned()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, bytes: Vec<u8>, _truncate: bool) -> StoreResult<()> {
        self.inner.write().files.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> StoreResult<()> {
        self.inner.write().dirs.insert(path.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.inner.write().files.remove(path);
        Ok(())
    }

    async fn stat(&self, path: &str) -> StoreResult<bool> {
        Ok(self
            .inner
            .read()
            .files
            .get(path)
            .is_some_and(|b| !b.is_empty()))
    }
}
