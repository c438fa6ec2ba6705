// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup configuration: the CLI surface and the XML config file it points
//! at.

pub mod cli;
pub mod xml;

pub use cli::Cli;
pub use xml::{load, ServerConfig};

/// Map `general/log@level` (`debug|info|warning|error|critical`) onto a
/// `tracing` filter directive — `warning`/`critical` aren't `tracing`'s own
/// vocabulary, so they're translated rather than passed through.
pub fn tracing_level_filter(log_level: &str) -> &'static str {
    match log_level {
        "debug" => "debug",
        "warning" => "warn",
        "critical" | "error" => "error",
        _ => "info",
    }
}
