// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! Thin `clap`-derived CLI. Every subcommand is a shell that loads
//! [`arke::config::Config`] and calls straight into the library crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "arke", about = "Content-addressed archival storage service")]
pub struct Cli {
    /// Path to a TOML config file; defaults built in if omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API server plus the periodic snapshot/export schedulers.
    Serve,
    /// Manually trigger a snapshot build and exit.
    SnapshotRebuild,
    /// Export the latest snapshot's closure to an archive file.
    Export {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Import an archive file, rebuilding tips and the index pointer.
    Import {
        #[arg(long)]
        archive: PathBuf,
    },
}
