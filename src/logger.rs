// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Structured logging setup: `tracing` + `tracing-subscriber` with an
//! `EnvFilter`, writing to stderr so log lines are never interleaved with
//! response bodies. The line formatter (compact for interactive use, JSON
//! for log-aggregator ingestion) is selectable via [`crate::config::LogFormat`].

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

pub fn init(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
