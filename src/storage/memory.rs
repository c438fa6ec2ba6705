// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process reference `Storage` implementation.
//!
//! Backed by `RwLock`-guarded maps rather than a real database driver,
//! matching the registry style used elsewhere in this crate
//! (`RwLock<HashMap<K, V>>` plus snapshot-returning reads). SensorAlerts are
//! kept in a `BTreeMap` keyed by id so that fetching pending alerts in id
//! order falls out of iteration order rather than a sort on every call.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::model::node::NodeType;
use crate::model::sensor::DataValue;
use crate::model::{Alert, Manager, Node, Sensor, SensorAlert};

use super::{StateSnapshot, Storage};

#[derive(Default)]
struct Inner {
    nodes: HashMap<i64, Node>,
    sensors: HashMap<i64, Sensor>,
    alerts: HashMap<i64, Alert>,
    managers: HashMap<i64, Manager>,
    sensor_alerts: BTreeMap<i64, SensorAlert>,
}

/// In-memory `Storage`. Not durable across restarts; suitable for tests and
/// for exercising the rule engine without a real database dependency.
pub struct MemoryStorage {
    inner: RwLock<Inner>,
    next_node_id: AtomicI64,
    next_sensor_id: AtomicI64,
    next_alert_id: AtomicI64,
    next_manager_id: AtomicI64,
    next_sensor_alert_id: AtomicI64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_node_id: AtomicI64::new(1),
            next_sensor_id: AtomicI64::new(1),
            next_alert_id: AtomicI64::new(1),
            next_manager_id: AtomicI64::new(1),
            next_sensor_alert_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_node(&self, mut node: Node) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().await;
        let existing =
            inner.nodes.values().find(|n| n.username == node.username).map(|n| n.id);
        let id = existing.unwrap_or_else(|| self.next_node_id.fetch_add(1, Ordering::Relaxed));
        node.id = id;
        inner.nodes.insert(id, node);
        Ok(id)
    }

    async fn upsert_sensor(&self, mut sensor: Sensor) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .sensors
            .values()
            .find(|s| s.node_id == sensor.node_id && s.remote_sensor_id == sensor.remote_sensor_id)
            .map(|s| s.id);
        let id = existing.unwrap_or_else(|| self.next_sensor_id.fetch_add(1, Ordering::Relaxed));
        sensor.id = id;
        inner.sensors.insert(id, sensor);
        Ok(id)
    }

    async fn upsert_alert(&self, mut alert: Alert) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .alerts
            .values()
            .find(|a| a.node_id == alert.node_id && a.remote_alert_id == alert.remote_alert_id)
            .map(|a| a.id);
        let id = existing.unwrap_or_else(|| self.next_alert_id.fetch_add(1, Ordering::Relaxed));
        alert.id = id;
        inner.alerts.insert(id, alert);
        Ok(id)
    }

    async fn upsert_manager(&self, mut manager: Manager) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().await;
        let existing = inner.managers.values().find(|m| m.node_id == manager.node_id).map(|m| m.id);
        let id = existing.unwrap_or_else(|| self.next_manager_id.fetch_add(1, Ordering::Relaxed));
        manager.id = id;
        inner.managers.insert(id, manager);
        Ok(id)
    }

    async fn update_sensor_state(
        &self,
        sensor_id: i64,
        state: bool,
        data: DataValue,
        now: f64,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let sensor = inner
            .sensors
            .get_mut(&sensor_id)
            .ok_or_else(|| StorageError::NotFound(format!("sensor {sensor_id}")))?;
        if sensor.state != state {
            sensor.last_state_updated = now;
        }
        sensor.state = state;
        sensor.data = data;
        Ok(())
    }

    async fn append_sensor_alert(&self, mut alert: SensorAlert) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().await;
        let id = self.next_sensor_alert_id.fetch_add(1, Ordering::Relaxed);
        alert.id = id;
        inner.sensor_alerts.insert(id, alert);
        Ok(id)
    }

    async fn pending_sensor_alerts(&self) -> Result<Vec<SensorAlert>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.sensor_alerts.values().cloned().collect())
    }

    async fn take_sensor_alerts(&self, ids: &[i64]) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        for id in ids {
            inner.sensor_alerts.remove(id);
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<StateSnapshot, StorageError> {
        let inner = self.inner.read().await;
        Ok(StateSnapshot {
            nodes: inner.nodes.values().cloned().collect(),
            sensors: inner.sensors.values().cloned().collect(),
            alerts: inner.alerts.values().cloned().collect(),
            managers: inner.managers.values().cloned().collect(),
        })
    }

    async fn referenced_alert_levels(&self) -> Result<Vec<i64>, StorageError> {
        let inner = self.inner.read().await;
        let mut levels: Vec<i64> = inner
            .sensors
            .values()
            .flat_map(|s| s.alert_levels.iter().copied())
            .chain(inner.alerts.values().flat_map(|a| a.alert_levels.iter().copied()))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        Ok(levels)
    }

    async fn set_node_connected(&self, node_id: i64, connected: bool) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node {node_id}")))?;
        node.connected = connected;
        Ok(())
    }

    async fn find_node(
        &self,
        username: &str,
        node_type: NodeType,
    ) -> Result<Option<Node>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.values().find(|n| n.username == username && n.node_type == node_type).cloned())
    }

    async fn find_sensor_by_username(
        &self,
        username: &str,
        remote_sensor_id: i64,
    ) -> Result<Option<Sensor>, StorageError> {
        let inner = self.inner.read().await;
        let Some(node) = inner.nodes.values().find(|n| n.username == username) else {
            return Ok(None);
        };
        Ok(inner
            .sensors
            .values()
            .find(|s| s.node_id == node.id && s.remote_sensor_id == remote_sensor_id)
            .cloned())
    }

    async fn connected_alert_nodes_for_level(&self, level: i64) -> Result<Vec<Node>, StorageError> {
        let inner = self.inner.read().await;
        let node_ids: Vec<i64> = inner
            .alerts
            .values()
            .filter(|a| a.alert_levels.contains(&level))
            .map(|a| a.node_id)
            .collect();
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.connected && node_ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn connected_managers(&self) -> Result<Vec<Node>, StorageError> {
        let inner = self.inner.read().await;
        let manager_node_ids: Vec<i64> = inner.managers.values().map(|m| m.node_id).collect();
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.connected && manager_node_ids.contains(&n.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sensor::DataType;

    fn sensor_node(username: &str) -> Node {
        Node {
            id: 0,
            hostname: "host".into(),
            node_type: NodeType::Sensor,
            instance: "test".into(),
            version: 1.0,
            rev: 0,
            username: username.into(),
            persistent: false,
            connected: true,
        }
    }

    #[tokio::test]
    async fn upsert_node_is_idempotent_by_username() {
        let storage = MemoryStorage::new();
        let id1 = storage.upsert_node(sensor_node("alice")).await.unwrap();
        let id2 = storage.upsert_node(sensor_node("alice")).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(storage.snapshot().await.unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn sensor_alerts_come_back_in_id_order() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage
                .append_sensor_alert(SensorAlert {
                    id: 0,
                    sensor_id: 1,
                    node_id: 1,
                    state: true,
                    has_optional_data: false,
                    optional_data: None,
                    change_state: true,
                    has_latest_data: false,
                    data_type: DataType::None,
                    data: DataValue::None,
                    alert_levels: vec![1],
                    time_received: i as f64,
                })
                .await
                .unwrap();
        }
        let pending = storage.pending_sensor_alerts().await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn take_sensor_alerts_is_atomic_over_the_given_set() {
        let storage = MemoryStorage::new();
        let mut ids = Vec::new();
        for i in 0..3 {
            let id = storage
                .append_sensor_alert(SensorAlert {
                    id: 0,
                    sensor_id: 1,
                    node_id: 1,
                    state: true,
                    has_optional_data: false,
                    optional_data: None,
                    change_state: true,
                    has_latest_data: false,
                    data_type: DataType::None,
                    data: DataValue::None,
                    alert_levels: vec![1],
                    time_received: i as f64,
                })
                .await
                .unwrap();
            ids.push(id);
        }
        storage.take_sensor_alerts(&ids[..2]).await.unwrap();
        let remaining = storage.pending_sensor_alerts().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[2]);
    }
}
