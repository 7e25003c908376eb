// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! HTTP implementation of [`BlockStore`]/[`Mfs`] over the Kubo-style surface
//! assumed here: `POST /dag/put`, `/dag/get`, `/add`, `/pin/*`,
//! `/files/*`. Transient failures are retried with capped exponential
//! backoff via `backon`; `NotFound` is never retried.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use cid::Cid;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RetryConfig;

use super::{BlockStore, Mfs, StoreCodec, StoreError, StoreResult};

pub struct HttpBlockStore {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpBlockStore {
    pub fn new(base_url: impl Into<String>, retry: RetryConfig) -> Self {
        HttpBlockStore {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            retry,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.retry.max_attempts as usize)
            .with_min_delay(Duration::from_millis(self.retry.base_backoff_ms))
    }

    async fn post_bytes(&self, path: &str, query: &[(&str, String)], body: Vec<u8>) -> StoreResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let client = &self.client;
        (|| async {
            let resp = client
                .post(&url)
                .query(query)
                .body(body.clone())
                .send()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound(url.clone()));
            }
            if !resp.status().is_success() {
                return Err(StoreError::Unavailable(format!(
                    "store returned {} for {url}",
                    resp.status()
                )));
            }
            resp.bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| StoreError::Unavailable(e.to_string()))
        })
        .retry(self.backoff())
        .when(|e: &StoreError| matches!(e, StoreError::Unavailable(_)))
        .await
    }

    fn codec_name(codec: StoreCodec) -> &'static str {
        match codec {
            StoreCodec::DagCbor => "dag-cbor",
            StoreCodec::DagJson => "dag-json",
        }
    }
}

impl BlockStore for HttpBlockStore {
    async fn put_dag<T>(&self, node: &T, codec: StoreCodec, pin: bool) -> StoreResult<Cid>
    where
        T: Serialize + Sync,
    {
        let encoded = match codec {
            StoreCodec::DagCbor => {
                serde_ipld_dagcbor::to_vec(node).map_err(|e| StoreError::Encode(e.to_string()))?
            }
            StoreCodec::DagJson => {
                serde_ipld_dagjson::to_vec(node).map_err(|e| StoreError::Encode(e.to_string()))?
            }
        };
        let resp = self
            .post_bytes(
                "/dag/put",
                &[
                    ("store-codec", Self::codec_name(codec).to_string()),
                    ("input-codec", Self::codec_name(codec).to_string()),
                    ("pin", pin.to_string()),
                ],
                encoded,
            )
            .await?;
        #[derive(serde::Deserialize)]
        struct PutResponse {
            #[serde(rename = "Cid")]
            cid: CidWire,
        }
        #[derive(serde::Deserialize)]
        struct CidWire {
            #[serde(rename = "/")]
            cid: String,
        }
        let parsed: PutResponse =
            serde_json::from_slice(&resp).map_err(|e| StoreError::Decode(e.to_string()))?;
        parsed
            .cid
            .cid
            .parse()
            .map_err(|e: cid::Error| StoreError::Decode(e.to_string()))
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
        self.post_bytes("/dag/get", &[("arg", cid.to_string())], Vec::new())
            .await
    }

    async fn add_bytes(&self, bytes: Vec<u8>, pin: bool) -> StoreResult<Cid> {
        let resp = self
            .post_bytes(
                "/add",
                &[("cid-version", "1".to_string()), ("pin", pin.to_string())],
                bytes,
            )
            .await?;
        #[derive(serde::Deserialize)]
        struct AddResponse {
            #[serde(rename = "Hash")]
            hash: String,
        }
        let parsed: AddResponse =
            serde_json::from_slice(&resp).map_err(|e| StoreError::Decode(e.to_string()))?;
        parsed
            .hash
            .parse()
            .map_err(|e: cid::Error| StoreError::Decode(e.to_string()))
    }

    async fn pin_add(&self, cid: Cid) -> StoreResult<()> {
        self.post_bytes("/pin/add", &[("arg", cid.to_string())], Vec::new())
            .await
            .map(|_| ())
    }

    async fn pin_rm(&self, cid: Cid) -> StoreResult<()> {
        self.post_bytes("/pin/rm", &[("arg", cid.to_string())], Vec::new())
            .await
            .map(|_| ())
    }

    async fn pin_update(&self, old: Cid, new: Cid) -> StoreResult<()> {
        self.post_bytes(
            "/pin/update",
            &[("arg", old.to_string()), ("arg", new.to_string())],
            Vec::new(),
        )
        .await
        .map(|_| ())
    }

    async fn dag_import(&self, archive: Vec<u8>) -> StoreResult<()> {
        self.post_bytes("/dag/import", &[], archive).await.map(|_| ())
    }
}

impl Mfs for HttpBlockStore {
    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.post_bytes("/files/read", &[("arg", path.to_string())], Vec::new())
            .await
    }

    async fn write(&self, path: &str, bytes: Vec<u8>, truncate: bool) -> StoreResult<()> {
        self.post_bytes(
            "/files/write",
            &[
                ("arg", path.to_string()),
                ("create", "true".to_string()),
                ("truncate", truncate.to_string()),
                ("parents", "true".to_string()),
            ],
            bytes,
        )
        .await
        .map(|_| ())
    }

    async fn mkdir(&self, path: &str) -> StoreResult<()> {
        self.post_bytes(
            "/files/mkdir",
            &[("arg", path.to_string()), ("parents", "true".to_string())],
            Vec::new(),
        )
        .await
        .map(|_| ())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.post_bytes("/files/rm", &[("arg", path.to_string())], Vec::new())
            .await
            .map(|_| ())
    }

    async fn stat(&self, path: &str) -> StoreResult<bool> {
        #[derive(serde::Deserialize)]
        struct StatResponse {
            #[serde(rename = "Size")]
            size: u64,
        }

        let bytes = match self
            .post_bytes("/files/stat", &[("arg", path.to_string())], Vec::new())
            .await
        {
            Ok(b) => b,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let parsed: StatResponse =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(parsed.size > 0)
    }
}
