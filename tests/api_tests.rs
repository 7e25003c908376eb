// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! HTTP-level properties for the public API surface: requests go through
//! the real `axum` router — handlers, DTOs, and `ArkeError`'s `IntoResponse`
//! mapping — rather than calling into C2/C3 directly.

use std::sync::Arc;

use arke::api::{router, AppState, SnapshotStatus};
use arke::config::Config;
use arke::pointer::IndexPointerStore;
use arke::store::memory::MemoryBlockStore;
use arke::store::BlockStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use cid::Cid;
use serde_json::Value;
use tower::ServiceExt;

async fn test_state() -> AppState<MemoryBlockStore> {
    let store = MemoryBlockStore::new();
    let pointer_store = IndexPointerStore::load(&store).await.unwrap();
    AppState {
        store: Arc::new(store),
        pointer_store: Arc::new(pointer_store),
        config: Config::default(),
        snapshot_status: Arc::new(SnapshotStatus::default()),
    }
}

fn dummy_cid(seed: u8) -> Cid {
    Cid::new_v1(0x55, cid::multihash::Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn post_entities_creates_an_entity_with_typed_link_cids_in_the_response() {
    let app = router(test_state().await);

    let component = dummy_cid(1);
    let request_body = format!(
        r#"{{"components":{{"body":{{"/":"{component}"}}}},"children_pi":[],"note":"hello"}}"#
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entities")
                .header("content-type", "application/json")
                .body(Body::from(request_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["ver"], 1);
    // a typed link round-trips as `{"/": "<cid>"}`, never a bare string.
    assert!(
        value["cid"]["/"].is_string(),
        "expected a typed-link cid, got {value}"
    );
}

#[tokio::test]
async fn post_versions_updates_the_tip_and_rejects_a_stale_expect_tip() {
    let app = router(test_state().await);

    let create_body = r#"{"components":{},"children_pi":[],"note":""}"#;
    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entities")
                .header("content-type", "application/json")
                .body(Body::from(create_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);
    let created = body_json(created).await;
    let pi = created["pi"].as_str().unwrap().to_string();
    let tip_cid = created["cid"]["/"].as_str().unwrap().to_string();

    let update_body = format!(
        r#"{{"expect_tip":{{"/":"{tip_cid}"}},"components_patch":{{}},"children_add":[],"children_remove":[],"note":"v2"}}"#
    );
    let updated = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/entities/{pi}/versions"))
                .header("content-type", "application/json")
                .body(Body::from(update_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = body_json(updated).await;
    assert_eq!(updated["ver"], 2);

    // Replaying the same (now stale) `expect_tip` is a CAS conflict, mapped
    // to 409 by `ArkeError::Conflict`'s `IntoResponse`.
    let stale_body = format!(
        r#"{{"expect_tip":{{"/":"{tip_cid}"}},"components_patch":{{}},"children_add":[],"children_remove":[],"note":"v3"}}"#
    );
    let conflict = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/entities/{pi}/versions"))
                .header("content-type", "application/json")
                .body(Body::from(stale_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
    let conflict = body_json(conflict).await;
    assert!(conflict["observed"]["/"].is_string());
}

#[tokio::test]
async fn get_entity_resolve_bytes_inlines_component_bytes() {
    let state = test_state().await;
    let component_bytes = b"hello component".to_vec();
    let component_cid = state.store.add_bytes(component_bytes.clone(), false).await.unwrap();
    let app = router(state);

    let create_body = format!(
        r#"{{"components":{{"body":{{"/":"{component_cid}"}}}},"children_pi":[],"note":""}}"#
    );
    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entities")
                .header("content-type", "application/json")
                .body(Body::from(create_body))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(created).await;
    let pi = created["pi"].as_str().unwrap().to_string();

    let as_cids = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/entities/{pi}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_cids.status(), StatusCode::OK);
    let as_cids = body_json(as_cids).await;
    assert!(as_cids.get("components_bytes").is_none());

    let as_bytes = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/entities/{pi}?resolve=bytes"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_bytes.status(), StatusCode::OK);
    let as_bytes = body_json(as_bytes).await;
    let encoded = as_bytes["components_bytes"]["body"].as_str().unwrap();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    assert_eq!(decoded, component_bytes);
}

#[tokio::test]
async fn get_entity_rejects_an_unknown_resolve_mode() {
    let app = router(test_state().await);

    let create_body = r#"{"components":{},"children_pi":[],"note":""}"#;
    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entities")
                .header("content-type", "application/json")
                .body(Body::from(create_body))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(created).await;
    let pi = created["pi"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/entities/{pi}?resolve=markdown"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_entity_on_an_unknown_pi_is_a_404() {
    let app = router(test_state().await);
    let pi = arke::pi::Pi::generate();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/entities/{pi}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
