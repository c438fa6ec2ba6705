// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SensorAlertExecuter`: the single writer of the rule evaluation-state
//! tree, and the only path from a stored `SensorAlert` to a pushed
//! `sensoralert` on the wire.
//!
//! The wake loop shape (event notify + shutdown token in one `select!`) is
//! grounded on `crates/cli/src/broker/distributor.rs::Distributor::run`;
//! the retry/backoff-on-storage-error constants below mirror that same
//! file's `MAX_RETRIES`/`PUSH_TIMEOUT` pair, repurposed from a credential
//! push to a storage read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::clock::Clock;
use crate::error::StorageError;
use crate::model::node::NodeType;
use crate::model::rule::{AlertLevelConfig, LevelEvalState, RuleElementConfig, RuleElementKind};
use crate::model::AlertLevelFiring;
use crate::notifier::Notifier;
use crate::protocol::{ResultCode, ServerMessage};
use crate::registry::SessionRegistry;
use crate::rule_eval::{evaluate_level, EvalClock, SensorSnapshot};
use crate::storage::{StateSnapshot, Storage};

const BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Upper bound on how long the executer sleeps between passes when neither
/// the signal nor a storage error wakes it early — keeps calendar rules and
/// pending rule-sequence windows from drifting past their deadline by more
/// than a second.
const COARSE_TICK: Duration = Duration::from_secs(1);

pub struct SensorAlertExecuter {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    levels: HashMap<i64, AlertLevelConfig>,
    states: HashMap<i64, LevelEvalState>,
    signal: Arc<Notify>,
    manager_dirty: Arc<Notify>,
    async_reply_timeout: Duration,
}

impl SensorAlertExecuter {
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<SessionRegistry>,
        clock: Arc<dyn Clock>,
        alert_levels: Vec<AlertLevelConfig>,
        signal: Arc<Notify>,
        manager_dirty: Arc<Notify>,
        async_reply_timeout: Duration,
    ) -> Self {
        let states =
            alert_levels.iter().map(|l| (l.level, l.new_eval_state())).collect::<HashMap<_, _>>();
        let levels = alert_levels.into_iter().map(|l| (l.level, l)).collect();
        Self {
            storage,
            notifier,
            registry,
            clock,
            levels,
            states,
            signal,
            manager_dirty,
            async_reply_timeout,
        }
    }

    /// Run until `cancel` fires, processing pending sensor alerts on every
    /// signal and on the coarse tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut backoff = BACKOFF_INITIAL;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.signal.notified() => {}
                _ = tokio::time::sleep(COARSE_TICK) => {}
            }
            match self.process_once().await {
                Ok(()) => backoff = BACKOFF_INITIAL,
                Err(e) => {
                    warn!("sensor alert executer storage error: {e}");
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, BACKOFF_MAX);
                }
            }
        }
    }

    /// One pass: fetch pending sensor alerts, evaluate affected levels,
    /// fan out firings, and consume what was handled. Public for direct use
    /// by tests.
    pub async fn process_once(&mut self) -> Result<(), StorageError> {
        let pending = self.storage.pending_sensor_alerts().await?;
        if pending.is_empty() {
            return Ok(());
        }

        let snapshot = self.storage.snapshot().await?;
        let mut referenced: Vec<i64> =
            pending.iter().flat_map(|a| a.alert_levels.iter().copied()).collect();
        referenced.sort_unstable();
        referenced.dedup();

        let mut any_fired = false;
        for level in referenced {
            let Some(firing) = self.evaluate_one_level(level, &pending, &snapshot).await? else {
                continue;
            };
            any_fired = true;
            self.fan_out(level, &firing).await;
        }

        let ids: Vec<i64> = pending.iter().map(|a| a.id).collect();
        self.storage.take_sensor_alerts(&ids).await?;
        if any_fired {
            self.manager_dirty.notify_one();
        }
        Ok(())
    }

    async fn evaluate_one_level(
        &mut self,
        level: i64,
        pending: &[crate::model::SensorAlert],
        snapshot: &StateSnapshot,
    ) -> Result<Option<AlertLevelFiring>, StorageError> {
        let Some(config) = self.levels.get(&level) else {
            return Ok(None);
        };

        let has_node = self.storage.has_connected_alert_node_for_level(level).await?;
        if !config.trigger_always && !has_node {
            return Ok(None);
        }

        if !config.rules_activated {
            let triggered_sensors = pending
                .iter()
                .filter(|a| a.alert_levels.contains(&level) && a.state)
                .filter_map(|a| resolve_sensor_identity(snapshot, a.node_id, a.sensor_id))
                .collect::<Vec<_>>();
            return Ok(if triggered_sensors.is_empty() {
                None
            } else {
                Some(AlertLevelFiring { level, triggered_sensors, timestamp: self.clock.now_unix() })
            });
        }

        let clock =
            EvalClock { now_unix: self.clock.now_unix(), now_local: self.clock.now_local(), now_utc: self.clock.now_utc() };
        let lookup = |username: &str, remote_sensor_id: i64| -> Option<SensorSnapshot> {
            let node = snapshot.nodes.iter().find(|n| n.username == username)?;
            let sensor =
                snapshot.sensors.iter().find(|s| s.node_id == node.id && s.remote_sensor_id == remote_sensor_id)?;
            Some(SensorSnapshot { state: sensor.state, last_state_updated: sensor.last_state_updated })
        };

        let state = self.states.entry(level).or_insert_with(|| config.new_eval_state());
        let Some(timestamp) = evaluate_level(config, state, &clock, &lookup) else {
            return Ok(None);
        };
        let triggered_sensors = collect_sensor_leaves(config, state);
        Ok(Some(AlertLevelFiring { level, triggered_sensors, timestamp }))
    }

    async fn fan_out(&self, level: i64, firing: &AlertLevelFiring) {
        let Some(config) = self.levels.get(&level) else { return };

        let nodes = match self.storage.connected_alert_nodes_for_level(level).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("failed to list alert nodes for level {level}: {e}");
                Vec::new()
            }
        };

        let remote_sensor_id = firing.triggered_sensors.first().map(|(_, id)| *id).unwrap_or(0);
        for node in nodes {
            let Some(session) = self.registry.get(&node.username, NodeType::Alert).await else {
                continue;
            };
            let message = ServerMessage::Sensoralert {
                client_time: self.clock.now_unix(),
                result: ResultCode::Ok,
                alert_levels: vec![level],
                remote_sensor_id,
                state: true,
                optional_data: None,
            };
            // A failed push only drops this one node's firing; the level
            // is not retried to it.
            if session.push(message, self.async_reply_timeout).await.is_err() {
                warn!(username = node.username.as_str(), "alert push failed, closing session");
                session.close();
                self.registry.unregister(&session).await;
            }
        }

        if config.smtp_activated {
            self.notifier.send_sensor_alert(level, &config.name, &config.to_addr).await;
        }
    }
}

fn resolve_sensor_identity(
    snapshot: &StateSnapshot,
    node_id: i64,
    sensor_id: i64,
) -> Option<(String, i64)> {
    let node = snapshot.nodes.iter().find(|n| n.id == node_id)?;
    let sensor = snapshot.sensors.iter().find(|s| s.id == sensor_id)?;
    Some((node.username.clone(), sensor.remote_sensor_id))
}

/// Walk every rule in `config`, collecting the `(username, remoteSensorId)`
/// of each `sensor` leaf whose evaluation state is currently `triggered`,
/// for `AlertLevelFiring.triggered_sensors`. Run immediately after
/// `evaluate_level` returns `Some`, before the next pass overwrites the
/// per-leaf state — `evaluate_level` resets `finalized`/`time_when_triggered`
/// on completion but leaves `elements` untouched, so the leaves are still
/// readable at this point.
fn collect_sensor_leaves(config: &AlertLevelConfig, state: &LevelEvalState) -> Vec<(String, i64)> {
    let mut out = Vec::new();
    for (rule, rule_state) in config.rules.iter().zip(state.rules.iter()) {
        collect_from_element(&rule.body, rule_state, &mut out);
    }
    out
}

fn collect_from_element(
    elem: &RuleElementConfig,
    rule_state: &crate::model::rule::RuleEvalState,
    out: &mut Vec<(String, i64)>,
) {
    match &elem.kind {
        RuleElementKind::Boolean(b) => {
            for child in &b.children {
                collect_from_element(child, rule_state, out);
            }
        }
        RuleElementKind::Sensor(s) => {
            if rule_state.element(elem.eval_id).triggered {
                out.push((s.username.clone(), s.remote_sensor_id));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "sensor_alert_tests.rs"]
mod tests;
