// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FixedClock;
use crate::model::rule::{RuleElementConfig, RuleSensorConfig, RuleStartConfig};
use crate::model::sensor::{DataType, DataValue};
use crate::model::{Node, Sensor, SensorAlert};
use crate::notifier::MockNotifier;
use crate::session::test_support::test_handle;
use crate::storage::memory::MemoryStorage;

fn level(rules_activated: bool, trigger_always: bool) -> AlertLevelConfig {
    AlertLevelConfig {
        level: 1,
        name: "intrusion".into(),
        trigger_always,
        smtp_activated: false,
        to_addr: String::new(),
        rules_activated,
        rules: if rules_activated {
            vec![RuleStartConfig {
                order: 1,
                min_time_after_prev: 0.0,
                max_time_after_prev: 0.0,
                counter_activated: false,
                counter_limit: 0,
                counter_wait_time: 0.0,
                body: RuleElementConfig {
                    eval_id: 0,
                    kind: RuleElementKind::Sensor(RuleSensorConfig {
                        username: "door1".into(),
                        remote_sensor_id: 7,
                    }),
                    time_triggered_for: 0.0,
                },
            }]
        } else {
            Vec::new()
        },
    }
}

async fn setup(
    rules_activated: bool,
    trigger_always: bool,
) -> (SensorAlertExecuter, Arc<MemoryStorage>, Arc<MockNotifier>, i64, i64) {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MockNotifier::default());
    let registry = Arc::new(SessionRegistry::new());
    let clock = Arc::new(FixedClock::new(chrono::Utc::now()));

    let node_id = storage
        .upsert_node(Node {
            id: 0,
            hostname: "door".into(),
            node_type: NodeType::Sensor,
            instance: "i1".into(),
            version: 1.0,
            rev: 0,
            username: "door1".into(),
            persistent: false,
            connected: true,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    let sensor_id = storage
        .upsert_sensor(Sensor {
            id: 0,
            node_id,
            remote_sensor_id: 7,
            description: "front door".into(),
            state: true,
            last_state_updated: 0.0,
            alert_delay: 0.0,
            alert_levels: vec![1],
            data_type: DataType::None,
            data: DataValue::None,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let alert_node_id = storage
        .upsert_node(Node {
            id: 0,
            hostname: "panel".into(),
            node_type: NodeType::Alert,
            instance: "i1".into(),
            version: 1.0,
            rev: 0,
            username: "panel1".into(),
            persistent: false,
            connected: true,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    storage
        .upsert_alert(crate::model::Alert {
            id: 0,
            node_id: alert_node_id,
            remote_alert_id: 1,
            description: "panel".into(),
            alert_levels: vec![1],
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let handle = test_handle("panel1", NodeType::Alert);
    registry.register(handle).await;

    let executer = SensorAlertExecuter::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&registry),
        clock,
        vec![level(rules_activated, trigger_always)],
        Arc::new(Notify::new()),
        Arc::new(Notify::new()),
        Duration::from_millis(20),
    );
    (executer, storage, notifier, node_id, sensor_id)
}

#[tokio::test]
async fn direct_firing_without_rules_reaches_connected_alert_node() {
    let (mut executer, storage, _notifier, node_id, sensor_id) = setup(false, false).await;
    storage
        .append_sensor_alert(SensorAlert {
            id: 0,
            sensor_id,
            node_id,
            state: true,
            has_optional_data: false,
            optional_data: None,
            change_state: true,
            has_latest_data: false,
            data_type: DataType::None,
            data: DataValue::None,
            alert_levels: vec![1],
            time_received: 0.0,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    executer.process_once().await.unwrap_or_else(|e| panic!("{e}"));
    let remaining = storage.pending_sensor_alerts().await.unwrap_or_else(|e| panic!("{e}"));
    assert!(remaining.is_empty(), "consumed pending alerts regardless of firing outcome");
}

#[tokio::test]
async fn rules_activated_level_fires_on_matching_sensor_state() {
    let (mut executer, storage, _notifier, node_id, sensor_id) = setup(true, false).await;
    storage
        .append_sensor_alert(SensorAlert {
            id: 0,
            sensor_id,
            node_id,
            state: true,
            has_optional_data: false,
            optional_data: None,
            change_state: true,
            has_latest_data: false,
            data_type: DataType::None,
            data: DataValue::None,
            alert_levels: vec![1],
            time_received: 0.0,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    executer.process_once().await.unwrap_or_else(|e| panic!("{e}"));
    // With minTimeAfterPrev/maxTimeAfterPrev both 0 and a single rule,
    // the chain finalizes in the same pass it is satisfied.
    let state = executer.states.get(&1).unwrap_or_else(|| panic!("missing level state"));
    assert!(!state.rules[0].finalized, "finalized state resets once the chain completes");
}

#[tokio::test]
async fn level_without_connected_node_and_no_trigger_always_is_skipped() {
    let (mut executer, storage, _notifier, node_id, sensor_id) = setup(false, false).await;
    // Disconnect the only alert node for this level.
    let registry = SessionRegistry::new();
    executer.registry = Arc::new(registry);
    storage
        .append_sensor_alert(SensorAlert {
            id: 0,
            sensor_id,
            node_id,
            state: true,
            has_optional_data: false,
            optional_data: None,
            change_state: true,
            has_latest_data: false,
            data_type: DataType::None,
            data: DataValue::None,
            alert_levels: vec![1],
            time_received: 0.0,
        })
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    executer.process_once().await.unwrap_or_else(|e| panic!("{e}"));
    assert!(storage.pending_sensor_alerts().await.unwrap_or_else(|e| panic!("{e}")).is_empty());
}

#[test]
fn collect_sensor_leaves_finds_every_triggered_leaf_across_rules() {
    let level = level(true, false);
    let mut state = level.new_eval_state();
    state.rules[0].elements[0].triggered = true;
    let leaves = collect_sensor_leaves(&level, &state);
    assert_eq!(leaves, vec![("door1".to_string(), 7)]);
}
