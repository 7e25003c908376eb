// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! C3 — the event chain. A singly-linked, append-only list of `Event` DAG
//! nodes; each node's `prev` link points at the previous head. Appending
//! requires the caller to already hold the index-pointer mutex —
//! enforced here by taking `&mut IndexPointer` rather than `&IndexPointerStore`.

use cid::Cid;

use crate::error::ArkeResult;
use crate::model::{Event, EventRecord, EventType, IndexPointer};
use crate::pi::Pi;
use crate::store::{BlockStore, StoreCodec};

/// Builds and stores one `Event` chained onto `pointer.event_head`, then
/// advances `pointer` in place. Caller must persist `pointer` afterward
/// (normally by running this inside [`crate::pointer::IndexPointerStore::with_lock`]).
pub async fn append<S: BlockStore>(
    store: &S,
    pointer: &mut IndexPointer,
    kind: EventType,
    pi: Pi,
    ver: u64,
    tip_cid: Cid,
    is_new_pi: bool,
) -> ArkeResult<Cid> {
    let event = Event::new(kind, pi, ver, tip_cid, pointer.event_head, chrono::Utc::now());
    let cid = store.put_dag(&event, StoreCodec::DagCbor, true).await?;

    pointer.event_head = Some(cid);
    pointer.event_count += 1;
    if is_new_pi {
        pointer.total_pis += 1;
    }

    Ok(cid)
}

/// `ListEvents(since_cid, limit) -> (records, next_cursor)`. Walks the chain
/// backward from `since_cid` (or the current head, when `None`), newest
/// first, matching the manifest/tip history walk used by [`crate::tip`].
pub async fn list<S: BlockStore>(
    store: &S,
    head: Option<Cid>,
    since_cid: Option<Cid>,
    limit: usize,
) -> ArkeResult<(Vec<EventRecord>, Option<Cid>)> {
    let mut cur = since_cid.or(head);
    let mut out = Vec::with_capacity(limit);
    while let Some(c) = cur {
        if out.len() >= limit {
            break;
        }
        let event: Event = store.get_dag(&c, StoreCodec::DagCbor).await?;
        if !event.has_valid_schema() {
            return Err(crate::error::ArkeError::Malformed(format!(
                "unrecognized event schema tag: {}",
                event.schema
            )));
        }
        out.push(EventRecord {
            event_cid: c,
            kind: event.kind,
            pi: event.pi,
            ver: event.ver,
            tip_cid: event.tip_cid,
            ts: event.ts,
        });
        cur = event.prev;
    }
    Ok((out, cur))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBlockStore;

    fn dummy_cid(seed: u8) -> Cid {
        let digest = cid::multihash::Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap();
        Cid::new_v1(0x55, digest)
    }

    #[tokio::test]
    async fn append_chains_onto_previous_head() {
        let store = MemoryBlockStore::new();
        let mut pointer = IndexPointer::default();
        let pi = Pi::generate();

        let first = append(&store, &mut pointer, EventType::Create, pi, 1, dummy_cid(1), true)
            .await
            .unwrap();
        assert_eq!(pointer.event_head, Some(first));
        assert_eq!(pointer.event_count, 1);
        assert_eq!(pointer.total_pis, 1);

        let second = append(&store, &mut pointer, EventType::Update, pi, 2, dummy_cid(2), false)
            .await
            .unwrap();
        assert_eq!(pointer.event_head, Some(second));
        assert_eq!(pointer.event_count, 2);
        assert_eq!(pointer.total_pis, 1);

        let event2: Event = store.get_dag(&second, StoreCodec::DagCbor).await.unwrap();
        assert_eq!(event2.prev, Some(first));
    }

    #[tokio::test]
    async fn list_walks_newest_first() {
        let store = MemoryBlockStore::new();
        let mut pointer = IndexPointer::default();
        let pi = Pi::generate();
        append(&store, &mut pointer, EventType::Create, pi, 1, dummy_cid(1), true)
            .await
            .unwrap();
        let second = append(&store, &mut pointer, EventType::Update, pi, 2, dummy_cid(2), false)
            .await
            .unwrap();

        let (records, cursor) = list(&store, pointer.event_head, None, 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_cid, second);
        assert!(cursor.is_none());

        let (page1, cursor1) = list(&store, pointer.event_head, None, 1).await.unwrap();
        assert_eq!(page1.len(), 1);
        assert_eq!(page1[0].event_cid, second);
        assert!(cursor1.is_some());
    }
}
