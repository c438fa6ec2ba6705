// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry.
//!
//! Generalizes `crates/cli/src/broker/registry.rs`'s `RwLock<HashMap<K, V>>`
//! pod registry from pod-name keys to `(username, NodeType)` keys: a new
//! registration for the same key force-closes whatever session currently
//! holds it.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::model::node::NodeType;
use crate::session::SessionHandle;

/// `(username, nodeType)` — the key that must stay unique across sessions.
pub type RegistryKey = (String, NodeType);

/// Tracks every currently-accepted [`SessionHandle`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<RegistryKey, std::sync::Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    /// Register `session`, force-closing and evicting whatever session
    /// currently holds the same `(username, nodeType)` key.
    pub async fn register(&self, session: std::sync::Arc<SessionHandle>) {
        let key = (session.username.clone(), session.node_type);
        let previous = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(key.clone(), session)
        };
        if let Some(old) = previous {
            warn!(
                username = key.0.as_str(),
                node_type = key.1.as_str(),
                "superseding existing session on re-registration"
            );
            old.close();
        } else {
            info!(username = key.0.as_str(), node_type = key.1.as_str(), "session registered");
        }
    }

    /// Remove `session` from the registry, but only if it is still the
    /// current holder of its key (a superseded session must not evict the
    /// session that replaced it).
    pub async fn unregister(&self, session: &SessionHandle) {
        let key = (session.username.clone(), session.node_type);
        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(&key) {
            if current.id == session.id {
                sessions.remove(&key);
            }
        }
    }

    pub async fn get(&self, username: &str, node_type: NodeType) -> Option<std::sync::Arc<SessionHandle>> {
        self.sessions.read().await.get(&(username.to_owned(), node_type)).cloned()
    }

    /// Snapshot of every currently registered session of `node_type`.
    pub async fn by_type(&self, node_type: NodeType) -> Vec<std::sync::Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.node_type == node_type)
            .cloned()
            .collect()
    }

    /// Snapshot of every currently registered session, for the watchdog
    /// sweep.
    pub async fn all(&self) -> Vec<std::sync::Arc<SessionHandle>> {
        self.sessions.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::test_handle;

    #[tokio::test]
    async fn reregistration_supersedes_old_session() {
        let registry = SessionRegistry::new();
        let a = test_handle("alice", NodeType::Manager);
        let b = test_handle("alice", NodeType::Manager);
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;

        assert!(a.is_closed());
        assert!(!b.is_closed());
        let current = registry.get("alice", NodeType::Manager).await.unwrap_or_else(|| panic!("missing"));
        assert_eq!(current.id, b.id);
    }

    #[tokio::test]
    async fn unregister_is_a_no_op_if_superseded() {
        let registry = SessionRegistry::new();
        let a = test_handle("alice", NodeType::Manager);
        let b = test_handle("alice", NodeType::Manager);
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;
        registry.unregister(&a).await;

        let current = registry.get("alice", NodeType::Manager).await;
        assert!(current.is_some());
    }

    #[tokio::test]
    async fn distinct_node_types_coexist() {
        let registry = SessionRegistry::new();
        let sensor = test_handle("alice", NodeType::Sensor);
        let manager = test_handle("alice", NodeType::Manager);
        registry.register(sensor).await;
        registry.register(manager).await;
        assert_eq!(registry.all().await.len(), 2);
    }
}
