// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Storage` contract.
//!
//! A relational backend (sqlite/mysql) is out of scope here; this module
//! owns only the trait and [`memory::MemoryStorage`], a reference
//! implementation used by the executers' own tests and as the default when
//! no production backend is configured.

pub mod memory;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::node::NodeType;
use crate::model::{Alert, Manager, Node, Sensor, SensorAlert};

/// Snapshot of everything a connected manager needs to reconstruct world
/// state.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub nodes: Vec<Node>,
    pub sensors: Vec<Sensor>,
    pub alerts: Vec<Alert>,
    pub managers: Vec<Manager>,
}

/// Everything the core needs from the durable backend.
///
/// Every method may fail; callers treat failure as transient and retry on
/// the next tick or RPC. Implementations must make
/// [`Storage::take_sensor_alerts`] atomic: either the returned alerts are
/// removed, or none are.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upsert a node identified by `username`, returning its stable id.
    async fn upsert_node(&self, node: Node) -> Result<i64, StorageError>;

    /// Upsert a sensor keyed by `(node_id, remote_sensor_id)`.
    async fn upsert_sensor(&self, sensor: Sensor) -> Result<i64, StorageError>;

    /// Upsert an alert keyed by `(node_id, remote_alert_id)`.
    async fn upsert_alert(&self, alert: Alert) -> Result<i64, StorageError>;

    /// Upsert a manager for `node_id`.
    async fn upsert_manager(&self, manager: Manager) -> Result<i64, StorageError>;

    /// Update a sensor's `state`/`data`, stamping `lastStateUpdated` to `now`.
    async fn update_sensor_state(
        &self,
        sensor_id: i64,
        state: bool,
        data: crate::model::sensor::DataValue,
        now: f64,
    ) -> Result<(), StorageError>;

    /// Append a new `SensorAlert`, returning its monotonic id.
    async fn append_sensor_alert(&self, alert: SensorAlert) -> Result<i64, StorageError>;

    /// Fetch all currently pending `SensorAlert`s, strictly increasing by
    /// `id`.
    async fn pending_sensor_alerts(&self) -> Result<Vec<SensorAlert>, StorageError>;

    /// Atomically remove the given `SensorAlert` ids.
    async fn take_sensor_alerts(&self, ids: &[i64]) -> Result<(), StorageError>;

    /// Full snapshot for manager fan-out.
    async fn snapshot(&self) -> Result<StateSnapshot, StorageError>;

    /// Every alert-level value referenced by any stored Sensor or Alert, for
    /// the startup cross-check.
    async fn referenced_alert_levels(&self) -> Result<Vec<i64>, StorageError>;

    /// Mark a node's connection state. `persistent` is set on first
    /// registration and otherwise left untouched by this call.
    async fn set_node_connected(&self, node_id: i64, connected: bool) -> Result<(), StorageError>;

    /// Look up a node by `(username, node_type)`, if registered.
    async fn find_node(
        &self,
        username: &str,
        node_type: NodeType,
    ) -> Result<Option<Node>, StorageError>;

    /// Look up a sensor by the pair a `RuleSensor` predicate references: the
    /// node's username plus the node-assigned `remote_sensor_id`.
    async fn find_sensor_by_username(
        &self,
        username: &str,
        remote_sensor_id: i64,
    ) -> Result<Option<Sensor>, StorageError>;

    /// All alert nodes whose configured `alertLevels` include `level` and
    /// whose node is currently connected.
    async fn connected_alert_nodes_for_level(
        &self,
        level: i64,
    ) -> Result<Vec<Node>, StorageError>;

    /// Whether any alert node configured for `level` is currently connected.
    async fn has_connected_alert_node_for_level(&self, level: i64) -> Result<bool, StorageError> {
        Ok(!self.connected_alert_nodes_for_level(level).await?.is_empty())
    }

    /// All currently connected manager nodes.
    async fn connected_managers(&self) -> Result<Vec<Node>, StorageError>;
}
