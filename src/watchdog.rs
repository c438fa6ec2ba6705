// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ConnectionWatchdog: periodic liveness sweep plus debounced communication
//! alerts for persistent nodes that have gone silent.
//!
//! Grounded on `crates/mux/src/upstream/health.rs`'s health-check loop
//! shape (`tokio::select!` between a sleep and a shutdown token) and
//! `crates/cli/src/broker/registry.rs::run_health_checks`'s
//! prune-after-timeout logic, repurposed from pod health to session
//! liveness.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::model::node::NodeType;
use crate::notifier::Notifier;
use crate::registry::SessionRegistry;
use crate::storage::Storage;

/// `connectionTimeout`, matching `alertRserver.py`'s
/// `self.connectionTimeout = 60`.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

fn sweep_interval(connection_timeout: Duration) -> Duration {
    std::cmp::min(connection_timeout / 2, Duration::from_secs(10))
}

/// Drives the periodic liveness sweep.
pub struct ConnectionWatchdog {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    connection_timeout: Duration,
    /// Persistent nodes (by username) with an active, undelivered "unreached"
    /// notification — cleared once the node reconnects. Debounced: at most
    /// one active unreached notification per node until resolved.
    notified: HashSet<String>,
}

impl ConnectionWatchdog {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        connection_timeout: Duration,
    ) -> Self {
        Self { registry, storage, notifier, clock, connection_timeout, notified: HashSet::new() }
    }

    /// Run the sweep loop until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let interval = sweep_interval(self.connection_timeout);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("watchdog shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&mut self) {
        let now = self.clock.now_unix();
        let timeout_secs = self.connection_timeout.as_secs_f64();
        for session in self.registry.all().await {
            if session.is_closed() {
                continue;
            }
            if now - session.last_recv() > timeout_secs {
                warn!(username = session.username.as_str(), "evicting unresponsive session");
                self.registry.unregister(&session).await;
                session.close();
                let node_id = session.node_id.load(std::sync::atomic::Ordering::Relaxed);
                if node_id != 0 {
                    if let Err(e) = self.storage.set_node_connected(node_id, false).await {
                        warn!("failed to mark node disconnected after eviction: {e}");
                    }
                }
            }
        }

        for node_type in [NodeType::Sensor, NodeType::Alert, NodeType::Manager] {
            let snapshot = match self.storage.snapshot().await {
                Ok(s) => s,
                Err(e) => {
                    warn!("watchdog failed to read storage snapshot: {e}");
                    return;
                }
            };
            for node in snapshot.nodes.iter().filter(|n| n.node_type == node_type && n.persistent) {
                let connected = self.registry.get(&node.username, node.node_type).await.is_some();
                if connected {
                    if self.notified.remove(&node.username) {
                        self.notifier.send_communication_alert_clear(&node.username).await;
                    }
                } else if !self.notified.contains(&node.username) {
                    self.notified.insert(node.username.clone());
                    self.notifier.send_communication_alert(&node.username, 1).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::node::NodeType;
    use crate::notifier::MockNotifier;
    use crate::session::test_support::test_handle;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::Storage as _;

    #[tokio::test]
    async fn evicts_sessions_past_connection_timeout() {
        let registry = Arc::new(SessionRegistry::new());
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::default());
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));

        let handle = test_handle("alice", NodeType::Manager);
        handle.touch(0.0);
        registry.register(handle.clone()).await;

        let mut watchdog = ConnectionWatchdog::new(
            Arc::clone(&registry),
            storage,
            notifier,
            clock.clone(),
            Duration::from_secs(60),
        );
        clock.advance(chrono::Duration::seconds(120));
        watchdog.sweep().await;

        assert!(handle.is_closed());
        assert!(registry.get("alice", NodeType::Manager).await.is_none());
    }

    #[tokio::test]
    async fn persistent_node_disconnect_notifies_once_and_clears_on_reconnect() {
        let registry = Arc::new(SessionRegistry::new());
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::default());
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));

        let node = crate::model::Node {
            id: 0,
            hostname: "host".into(),
            node_type: NodeType::Sensor,
            instance: "i1".into(),
            version: 1.0,
            rev: 0,
            username: "sensor1".into(),
            persistent: true,
            connected: false,
        };
        storage.upsert_node(node).await.unwrap_or_else(|e| panic!("{e}"));

        let mut watchdog = ConnectionWatchdog::new(
            Arc::clone(&registry),
            Arc::clone(&storage),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            clock,
            Duration::from_secs(60),
        );
        watchdog.sweep().await;
        assert_eq!(notifier.communication_alerts(), 1);
        watchdog.sweep().await;
        assert_eq!(notifier.communication_alerts(), 1, "second sweep must not re-notify");

        let handle = test_handle("sensor1", NodeType::Sensor);
        registry.register(handle).await;
        watchdog.sweep().await;
        assert_eq!(notifier.communication_clears(), 1);
    }
}
