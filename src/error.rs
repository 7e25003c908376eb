// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use thiserror::Error;

/// Core error kinds, shared by every layer above the block-store client.
///
/// Only the outermost HTTP handler (see [`crate::api::error_response`]) maps
/// these onto status codes; everything below just propagates `ArkeError`.
#[derive(Debug, Error)]
pub enum ArkeError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("CAS conflict on tip, observed {observed}")]
    Conflict { observed: Cid },

    #[error("entity already exists: {0}")]
    AlreadyExists(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("snapshot build already in progress (started {started_at})")]
    LockHeld { started_at: chrono::DateTime<chrono::Utc> },

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ArkeError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        ArkeError::Invariant(msg.into())
    }
}

pub type ArkeResult<T> = Result<T, ArkeError>;

/// Errors surfaced by the block-store client (C1). These are translated into
/// [`ArkeError::StoreUnavailable`] / [`ArkeError::NotFound`] by callers; kept
/// separate so the retry policy in [`crate::store::http`] can distinguish a
/// transient failure from a definitive "not there".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ArkeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(m) => ArkeError::StoreUnavailable(m),
            StoreError::NotFound(m) => ArkeError::NotFound(m),
            StoreError::Decode(m) | StoreError::Encode(m) => ArkeError::Malformed(m),
            StoreError::Io(e) => ArkeError::StoreUnavailable(e.to_string()),
        }
    }
}
