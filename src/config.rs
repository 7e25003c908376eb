// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Ambient configuration: one nested struct per component, a `Default` impl,
//! loaded from TOML with environment overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    pub container_name: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base_url: "http://127.0.0.1:5001/api/v0".to_string(),
            container_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub interval_minutes: u64,
    pub lock_path: PathBuf,
    pub stale_lock_seconds: u64,
    pub allow_big_block: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            interval_minutes: 60,
            lock_path: PathBuf::from("/tmp/arke-snapshot.lock"),
            stale_lock_seconds: 600,
            allow_big_block: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub interval_hours: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output_dir: PathBuf::from("/var/lib/arke/exports"),
            interval_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_addr: SocketAddr,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 5,
            base_backoff_ms: 100,
        }
    }
}

/// Log line formatter, selectable via the `log_format` key or
/// `ARKE_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub snapshot: SnapshotConfig,
    pub export: ExportConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from `path` (or starts from built-in defaults when
    /// `path` is `None`), then overlays any `ARKE_*` environment variables.
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("reading config {}: {e}", p.display()))?;
                Self::from_toml_str(&text)?
            }
            None => Config::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Overlays `ARKE_<SECTION>__<FIELD>` environment variables onto an
    /// already-parsed config, e.g. `ARKE_STORE__BASE_URL` or
    /// `ARKE_HTTP__LISTEN_ADDR`. Unparseable values are ignored rather than
    /// rejected, so a malformed override never blocks startup.
    pub fn apply_env_overrides(&mut self) {
        use std::env::var;

        if let Ok(v) = var("ARKE_STORE__BASE_URL") {
            self.store.base_url = v;
        }
        if let Ok(v) = var("ARKE_STORE__CONTAINER_NAME") {
            self.store.container_name = Some(v);
        }
        if let Some(v) = parsed_env("ARKE_SNAPSHOT__INTERVAL_MINUTES") {
            self.snapshot.interval_minutes = v;
        }
        if let Some(v) = parsed_env("ARKE_SNAPSHOT__STALE_LOCK_SECONDS") {
            self.snapshot.stale_lock_seconds = v;
        }
        if let Ok(v) = var("ARKE_EXPORT__OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(v);
        }
        if let Some(v) = parsed_env("ARKE_EXPORT__INTERVAL_HOURS") {
            self.export.interval_hours = v;
        }
        if let Some(v) = parsed_env("ARKE_HTTP__LISTEN_ADDR") {
            self.http.listen_addr = v;
        }
        if let Some(v) = parsed_env("ARKE_RETRY__MAX_ATTEMPTS") {
            self.retry.max_attempts = v;
        }
        if let Ok(v) = var("ARKE_LOG_FORMAT") {
            self.log_format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }
    }
}

/// Reads `key` from the environment and parses it, discarding both a missing
/// variable and an unparseable one.
fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
