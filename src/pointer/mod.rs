// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C4 — the index pointer. One small mutable record, one mutex. Every
//! mutation that touches the event chain, the pi count, or the snapshot
//! fields goes through [`IndexPointerStore::with_lock`], which guarantees the
//! read-modify-write is atomic with respect to other writers in this process
//! the "caller holds the index-pointer mutex" precondition.
//!
//! A single `tokio::sync::Mutex` (not `parking_lot`) because the guarded
//! section spans `.await` points — the MFS write that persists the pointer.

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::ArkeResult;
use crate::model::IndexPointer;
use crate::store::{Mfs, StoreError};

pub const INDEX_POINTER_PATH: &str = "/arke/index-pointer";

pub struct IndexPointerStore {
    state: Mutex<IndexPointer>,
}

impl IndexPointerStore {
    /// Loads the pointer from MFS, defaulting to a fresh zeroed record if it
    /// doesn't exist yet (first boot against an empty store).
    pub async fn load<S: Mfs>(store: &S) -> ArkeResult<Self> {
        let pointer: IndexPointer = match store.read(INDEX_POINTER_PATH).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| crate::error::ArkeError::Malformed(e.to_string()))?,
            Err(StoreError::NotFound(_)) => IndexPointer::default(),
            Err(e) => return Err(e.into()),
        };
        if !pointer.has_valid_schema() {
            return Err(crate::error::ArkeError::Malformed(format!(
                "unrecognized index-pointer schema tag: {}",
                pointer.schema
            )));
        }
        Ok(IndexPointerStore {
            state: Mutex::new(pointer),
        })
    }

    /// Runs `f` with exclusive access to the pointer, persists whatever `f`
    /// leaves it as, and returns `f`'s result. `f` mutates in place; any
    /// event-chain append or snapshot-field update must happen inside it.
    pub async fn with_lock<S, T, F>(&self, store: &S, f: F) -> ArkeResult<T>
    where
        S: Mfs,
        F: for<'a> FnOnce(&'a mut IndexPointer) -> BoxFuture<'a, ArkeResult<T>>,
    {
        let mut guard = self.state.lock().await;
        let result = f(&mut guard).await?;
        guard.last_updated = chrono::Utc::now();
        let bytes = serde_json::to_vec(&*guard)
            .map_err(|e| crate::error::ArkeError::Malformed(e.to_string()))?;
        store.write(INDEX_POINTER_PATH, bytes, true).await?;
        Ok(result)
    }

    /// Read-only snapshot for `GET /index-pointer` and scheduler trigger
    /// checks; does not need the async mutex's ordering guarantee.
    pub async fn current(&self) -> IndexPointer {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBlockStore;

    #[tokio::test]
    async fn loads_default_when_missing() {
        let store = MemoryBlockStore::new();
        let pointer_store = IndexPointerStore::load(&store).await.unwrap();
        assert_eq!(pointer_store.current().await.event_count, 0);
    }

    #[tokio::test]
    async fn with_lock_persists_mutation() {
        let store = MemoryBlockStore::new();
        let pointer_store = IndexPointerStore::load(&store).await.unwrap();

        pointer_store
            .with_lock(&store, |p| {
                Box::pin(async move {
                    p.event_count += 1;
                    p.total_pis += 1;
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert_eq!(pointer_store.current().await.event_count, 1);

        let reloaded = IndexPointerStore::load(&store).await.unwrap();
        assert_eq!(reloaded.current().await.event_count, 1);
    }
}
