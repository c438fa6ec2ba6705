// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vigilcore: server-side core of a distributed alarm system.
//!
//! This crate owns the concurrent event-processing backbone — the
//! session/protocol layer, the sensor-alert rule engine, and the
//! manager-update broadcaster — behind the `Storage`, `UserBackend`, and
//! `Notifier` contracts. The relational storage backend, the mail
//! transport's wire details, and the client UI are external collaborators.

// The workspace-wide unwrap/expect/panic denials (Cargo.toml `[lints]`)
// exist for production code paths; test modules reach for `.unwrap()` and
// `panic!("{e}")` freely to fail fast on unexpected setup errors.
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

pub mod clock;
pub mod config;
pub mod error;
pub mod executer;
pub mod model;
pub mod notifier;
pub mod protocol;
pub mod registry;
pub mod rule_eval;
pub mod server;
pub mod session;
pub mod storage;
pub mod user_backend;
pub mod watchdog;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::SystemClock;
use crate::config::ServerConfig;
use crate::executer::manager_update::{ManagerUpdateExecuter, FORCED_INTERVAL};
use crate::executer::sensor_alert::SensorAlertExecuter;
use crate::notifier::smtp::SmtpNotifier;
use crate::notifier::Notifier;
use crate::registry::SessionRegistry;
use crate::server::{Server, ASYNC_REPLY_TIMEOUT, PROTOCOL_MAJOR_VERSION, SERVER_RECEIVE_TIMEOUT};
use crate::session::run::SessionDeps;
use crate::storage::memory::MemoryStorage;
use crate::storage::Storage;
use crate::user_backend::csv_backend::CsvUserBackend;
use crate::user_backend::UserBackend;
use crate::watchdog::{ConnectionWatchdog, CONNECTION_TIMEOUT};

/// The CSV user-credentials file is named `users.csv` and kept alongside
/// the XML config file — the config format names the backend method
/// (`"csv"`) but not a path, so this is the one convention this core
/// supplies for it.
fn csv_backend_path(config_path: &Path) -> std::path::PathBuf {
    config_path.with_file_name("users.csv")
}

/// Cross-check every alert level referenced by stored sensors/alerts
/// against the levels actually defined in `config`: a missing definition is
/// configuration-fatal.
async fn check_alert_level_coverage(
    storage: &dyn Storage,
    config: &ServerConfig,
) -> Result<()> {
    let defined: std::collections::HashSet<i64> =
        config.alert_levels.iter().map(|l| l.level).collect();
    for level in storage.referenced_alert_levels().await.context("reading referenced alert levels")? {
        if !defined.contains(&level) {
            return Err(crate::error::ConfigError::UndefinedAlertLevel(level).into());
        }
    }
    Ok(())
}

/// Build every collaborator named in `config` and run the core until
/// `shutdown` fires: the TLS acceptor, the connection watchdog, the
/// sensor-alert executer, and the manager-update executer all run
/// concurrently, each isolated so a fault in one never stops the others.
pub async fn run(config: ServerConfig, config_path: &Path, shutdown: CancellationToken) -> Result<()> {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    check_alert_level_coverage(storage.as_ref(), &config).await?;

    let user_backend: Arc<dyn UserBackend> = match config.user_backend_method.as_str() {
        "csv" => {
            let path = csv_backend_path(config_path);
            Arc::new(
                CsvUserBackend::load(&path)
                    .with_context(|| format!("loading CSV user backend from {}", path.display()))?,
            )
        }
        other => anyhow::bail!("unsupported storage/userBackend method: {other}"),
    };

    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(config.smtp.clone()));
    let registry = Arc::new(SessionRegistry::new());
    let clock = Arc::new(SystemClock);

    let sensor_alert_signal = Arc::new(Notify::new());
    let manager_dirty_signal = Arc::new(Notify::new());

    let deps = Arc::new(SessionDeps {
        storage: Arc::clone(&storage),
        user_backend,
        notifier: Arc::clone(&notifier),
        registry: Arc::clone(&registry),
        clock: Arc::clone(&clock) as Arc<dyn clock::Clock>,
        sensor_alert_signal: Arc::clone(&sensor_alert_signal),
        manager_dirty_signal: Arc::clone(&manager_dirty_signal),
        protocol_major_version: PROTOCOL_MAJOR_VERSION,
        server_receive_timeout: SERVER_RECEIVE_TIMEOUT,
        async_reply_timeout: ASYNC_REPLY_TIMEOUT,
    });

    let server = Server::bind(&config, Arc::clone(&deps)).await?;

    let watchdog = ConnectionWatchdog::new(
        Arc::clone(&registry),
        Arc::clone(&storage),
        Arc::clone(&notifier),
        Arc::clone(&clock) as Arc<dyn clock::Clock>,
        CONNECTION_TIMEOUT,
    );

    let sensor_alert_executer = SensorAlertExecuter::new(
        Arc::clone(&storage),
        Arc::clone(&notifier),
        Arc::clone(&registry),
        Arc::clone(&clock) as Arc<dyn clock::Clock>,
        config.alert_levels.clone(),
        Arc::clone(&sensor_alert_signal),
        Arc::clone(&manager_dirty_signal),
        ASYNC_REPLY_TIMEOUT,
    );

    let manager_update_executer = ManagerUpdateExecuter::new(
        Arc::clone(&storage),
        Arc::clone(&registry),
        Arc::clone(&clock) as Arc<dyn clock::Clock>,
        Arc::clone(&manager_dirty_signal),
        FORCED_INTERVAL,
        ASYNC_REPLY_TIMEOUT,
    );

    info!(port = config.port, "vigilcore starting");

    let (server_result, (), (), ()) = tokio::join!(
        server.run(shutdown.clone()),
        watchdog.run(shutdown.clone()),
        sensor_alert_executer.run(shutdown.clone()),
        manager_update_executer.run(shutdown.clone()),
    );
    server_result?;

    info!("vigilcore stopped");
    Ok(())
}
