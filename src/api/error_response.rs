// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! The only place in the crate that maps [`ArkeError`] kinds onto HTTP
//! status codes.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ArkeError;

use super::json::DagJson;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed: Option<cid::Cid>,
}

impl IntoResponse for ArkeError {
    fn into_response(self) -> Response {
        let (status, observed) = match &self {
            ArkeError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            ArkeError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ArkeError::Conflict { observed } => (StatusCode::CONFLICT, Some(*observed)),
            ArkeError::AlreadyExists(_) => (StatusCode::CONFLICT, None),
            ArkeError::Malformed(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            ArkeError::LockHeld { .. } => (StatusCode::SERVICE_UNAVAILABLE, None),
            ArkeError::Invariant(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "invariant violated");
        }

        let body = ErrorBody {
            error: self.to_string(),
            observed,
        };

        let mut response = (status, DagJson(body)).into_response();
        if let ArkeError::LockHeld { .. } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("60"));
        }
        response
    }
}
