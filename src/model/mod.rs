// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! The tagged DAG-node types: manifests, events, the index
//! pointer, and snapshots. Every link-valued field is a `cid::Cid`, never a
//! bare string, so the typed-link contract is enforced by the
//! type system rather than by convention.

pub mod event;
pub mod index_pointer;
pub mod manifest;
pub mod schema;
pub mod snapshot;

pub use event::{Event, EventRecord, EventType};
pub use index_pointer::IndexPointer;
pub use manifest::Manifest;
pub use snapshot::{Consistency, Snapshot, SnapshotEntry};
