// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface: no flags beyond the config file path.

use std::path::PathBuf;

use clap::Parser;

/// Server-side core of the alarm system.
#[derive(Debug, Parser)]
#[command(name = "vigilcore", version, about)]
pub struct Cli {
    /// Path to the XML configuration file.
    #[arg(env = "VIGILCORE_CONFIG")]
    pub config: PathBuf,
}
