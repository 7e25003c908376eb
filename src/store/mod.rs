// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C1 — the block-store client. A thin façade over the external
//! content-addressed store: put/get typed DAG nodes, add raw bytes,
//! pin/unpin/update, and the mutable-namespace (MFS) operations. Everything
//! above this module is written against [`BlockStore`] + [`Mfs`]; the real
//! HTTP implementation ([`http::HttpBlockStore`]) and the in-memory one used
//! by tests ([`memory::MemoryBlockStore`]) both satisfy it.

pub mod car;
pub mod codec;
pub mod http;
pub mod memory;

use cid::Cid;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which canonical encoding a DAG node is stored with. The core always
/// requests the *typed-link input codec* — that's not a runtime
/// choice here, it falls out of using [`cid::Cid`]-typed fields with either
/// of these codecs, both of which special-case `Cid` rather than treating it
/// as an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCodec {
    /// `serde_ipld_dagcbor`: CBOR tag(42) for every `Cid`-typed field.
    DagCbor,
    /// `serde_ipld_dagjson`: `{"/":"<cid>"}` for every `Cid`-typed field.
    /// Used for snapshots: some archive-walker tools historically ignore
    /// typed-binary links inside root nodes.
    DagJson,
}

/// Façade the rest of the core programs against. Generic (not `dyn`) so that
/// async methods can stay monomorphized; callers thread a concrete `S: Store`
/// (or `Arc<S>`) through their constructors.
pub trait BlockStore: Send + Sync {
    /// `PutDAG(node, store_codec, input_codec=typed, pin) -> CID`.
    fn put_dag<T>(
        &self,
        node: &T,
        codec: StoreCodec,
        pin: bool,
    ) -> impl std::future::Future<Output = StoreResult<Cid>> + Send
    where
        T: Serialize + Sync;

    /// `GetDAG(cid) -> node`, decoded according to `codec`.
    fn get_dag<T>(
        &self,
        cid: &Cid,
        codec: StoreCodec,
    ) -> impl std::future::Future<Output = StoreResult<T>> + Send
    where
        T: DeserializeOwned;

    /// Returns the raw, still-encoded bytes for `cid` — used by the codec
    /// conformance check (`Codec.TypedLinkRequired`) and by
    /// the CAR exporter.
    fn get_block(&self, cid: &Cid) -> impl std::future::Future<Output = StoreResult<Vec<u8>>> + Send;

    /// `AddBytes(stream, pin=false) -> CID`.
    fn add_bytes(
        &self,
        bytes: Vec<u8>,
        pin: bool,
    ) -> impl std::future::Future<Output = StoreResult<Cid>> + Send;

    fn pin_add(&self, cid: Cid) -> impl std::future::Future<Output = StoreResult<()>> + Send;
    fn pin_rm(&self, cid: Cid) -> impl std::future::Future<Output = StoreResult<()>> + Send;
    /// Atomic pin swap; cheaper than a (rm, add) pair and used by tip
    /// updates.
    fn pin_update(
        &self,
        old: Cid,
        new: Cid,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// `DAGImport(byte stream) -> stats`: ingests a whole
    /// archive file into the store, pinless by default. The store owns the
    /// archive format; the core only inspects the parsed roots/blocks
    /// separately (see [`car::read_car`]) for its own bookkeeping.
    fn dag_import(&self, archive: Vec<u8>) -> impl std::future::Future<Output = StoreResult<()>> + Send;
}

/// The block store's mutable-namespace abstraction: tip files and the index
/// pointer live here.
pub trait Mfs: Send + Sync {
    fn read(&self, path: &str) -> impl std::future::Future<Output = StoreResult<Vec<u8>>> + Send;
    fn write(
        &self,
        path: &str,
        bytes: Vec<u8>,
        truncate: bool,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;
    fn mkdir(&self, path: &str) -> impl std::future::Future<Output = StoreResult<()>> + Send;
    fn remove(&self, path: &str) -> impl std::future::Future<Output = StoreResult<()>> + Send;
    fn stat(&self, path: &str) -> impl std::future::Future<Output = StoreResult<bool>> + Send;
}
