// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use vigilcore::config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match vigilcore::config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(vigilcore::config::tracing_level_filter(
                    &config.log_level,
                ))
            }),
        )
        .init();

    let shutdown = CancellationToken::new();
    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_on_signal.cancel();
        }
    });

    if let Err(e) = vigilcore::run(config, &cli.config, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
