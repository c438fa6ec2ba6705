// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ManagerUpdateExecuter`: coalesces every sensor/alert mutation into a
//! single `status` push per connected manager, at most once per
//! `forcedInterval` unless a dirty signal arrives sooner.
//!
//! The bounded-concurrency fan-out (semaphore + `tokio::spawn` per target,
//! joined at the end) is grounded on
//! `crates/cli/src/broker/distributor.rs::Distributor::distribute`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::model::node::NodeType;
use crate::protocol::{ResultCode, ServerMessage};
use crate::registry::SessionRegistry;
use crate::storage::Storage;

/// Per-round concurrency cap on outstanding manager pushes.
const MAX_CONCURRENT: usize = 10;

/// `forcedInterval`, matching `alertRserver.py`'s periodic status refresh
/// even when nothing changed.
pub const FORCED_INTERVAL: Duration = Duration::from_secs(60);

pub struct ManagerUpdateExecuter {
    storage: Arc<dyn Storage>,
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    dirty_signal: Arc<Notify>,
    forced_interval: Duration,
    async_reply_timeout: Duration,
}

impl ManagerUpdateExecuter {
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: Arc<SessionRegistry>,
        clock: Arc<dyn Clock>,
        dirty_signal: Arc<Notify>,
        forced_interval: Duration,
        async_reply_timeout: Duration,
    ) -> Self {
        Self { storage, registry, clock, dirty_signal, forced_interval, async_reply_timeout }
    }

    /// Run until `cancel` fires, pushing `status` on every dirty signal and
    /// at least once every `forced_interval`.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.dirty_signal.notified() => {}
                _ = tokio::time::sleep(self.forced_interval) => {}
            }
            self.push_status_to_all().await;
        }
    }

    /// One broadcast round. Public for direct use by tests.
    pub async fn push_status_to_all(&self) {
        let snapshot = match self.storage.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!("manager update executer failed to read storage snapshot: {e}");
                return;
            }
        };
        let managers = match self.storage.connected_managers().await {
            Ok(m) => m,
            Err(e) => {
                warn!("manager update executer failed to list connected managers: {e}");
                return;
            }
        };
        if managers.is_empty() {
            return;
        }

        let message = Arc::new(ServerMessage::Status {
            client_time: self.clock.now_unix(),
            result: ResultCode::Ok,
            nodes: snapshot.nodes,
            sensors: snapshot.sensors,
            alerts: snapshot.alerts,
            managers: snapshot.managers,
        });

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT));
        let mut handles = Vec::with_capacity(managers.len());
        for node in managers {
            let sem = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let message = Arc::clone(&message);
            let timeout = self.async_reply_timeout;
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                let Some(session) = registry.get(&node.username, NodeType::Manager).await else {
                    return;
                };
                if session.push((*message).clone(), timeout).await.is_err() {
                    warn!(username = node.username.as_str(), "status push failed, closing session");
                    session.close();
                    registry.unregister(&session).await;
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("manager update push task panicked: {e}");
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_update_tests.rs"]
mod tests;
