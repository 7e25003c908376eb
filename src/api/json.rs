// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! A typed-link-aware stand-in for `axum::Json`. Plain `axum::Json` goes
//! through `serde_json`, which renders a `cid::Cid` as a bare string in
//! human-readable output — exactly the shape the core rejects everywhere
//! else. `DagJson` goes through `serde_ipld_dagjson` instead, so every CID
//! field reaches the wire as `{"/":"cid"}`, both coming in (request bodies)
//! and going out (response bodies).

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ArkeError;

pub struct DagJson<T>(pub T);

impl<T, S> FromRequest<S> for DagJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ArkeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ArkeError::Malformed(e.to_string()))?;
        let value = serde_ipld_dagjson::from_slice(&bytes)
            .map_err(|e| ArkeError::Malformed(format!("invalid request body: {e}")))?;
        Ok(DagJson(value))
    }
}

impl<T: Serialize> IntoResponse for DagJson<T> {
    fn into_response(self) -> Response {
        match serde_ipld_dagjson::to_vec(&self.0) {
            Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
            Err(e) => ArkeError::Invariant(format!("encoding response body: {e}")).into_response(),
        }
    }
}
