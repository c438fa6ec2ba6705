// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FixedClock;
use crate::model::{Manager, Node};
use crate::session::test_support::test_handle;
use crate::storage::memory::MemoryStorage;

#[tokio::test]
async fn pushes_status_to_every_connected_manager() {
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(SessionRegistry::new());
    let clock = Arc::new(FixedClock::new(chrono::Utc::now()));

    let node_id = storage
        .upsert_node(Node {
            id: 0,
            hostname: "mgr".into(),
            node_type: NodeType::Manager,
            instance: "i1".into(),
            version: 1.0,
            rev: 0,
            username: "mgr1".into(),
            persistent: false,
            connected: true,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    storage
        .upsert_manager(Manager { id: 0, node_id, description: "dashboard".into() })
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    let handle = test_handle("mgr1", NodeType::Manager);
    registry.register(handle).await;

    let executer = ManagerUpdateExecuter::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&registry),
        clock,
        Arc::new(Notify::new()),
        FORCED_INTERVAL,
        Duration::from_millis(20),
    );
    executer.push_status_to_all().await;

    // The test handle never acks, so the push times out and the
    // session is evicted.
    assert!(registry.get("mgr1", NodeType::Manager).await.is_none());
}

#[tokio::test]
async fn no_connected_managers_is_a_no_op() {
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(SessionRegistry::new());
    let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
    let executer = ManagerUpdateExecuter::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        registry,
        clock,
        Arc::new(Notify::new()),
        FORCED_INTERVAL,
        Duration::from_secs(1),
    );
    executer.push_status_to_all().await;
}
