// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::TimeZone;

use super::*;
use crate::model::rule::{RuleElementConfig, RuleSensorConfig, RuleStartConfig};

fn clock_at(now_unix: f64) -> EvalClock {
    let now_utc = Utc.timestamp_opt(now_unix as i64, 0).single().unwrap();
    EvalClock { now_unix, now_local: now_utc.with_timezone(&Local), now_utc }
}

fn sensor_rule(order: i64, username: &str, remote_id: i64) -> RuleStartConfig {
    RuleStartConfig {
        order,
        min_time_after_prev: 1.0,
        max_time_after_prev: 5.0,
        counter_activated: false,
        counter_limit: 0,
        counter_wait_time: 0.0,
        body: RuleElementConfig {
            eval_id: 0,
            kind: RuleElementKind::Sensor(RuleSensorConfig {
                username: username.into(),
                remote_sensor_id: remote_id,
            }),
            time_triggered_for: 0.0,
        },
    }
}

fn level_with(rules: Vec<RuleStartConfig>) -> AlertLevelConfig {
    AlertLevelConfig {
        level: 1,
        name: "test".into(),
        trigger_always: false,
        smtp_activated: false,
        to_addr: String::new(),
        rules_activated: true,
        rules,
    }
}

#[test]
fn single_rule_fires_when_sensor_triggers() {
    let level = level_with(vec![sensor_rule(1, "s1", 7)]);
    let mut state = level.new_eval_state();
    let sensors = |u: &str, r: i64| -> Option<SensorSnapshot> {
        (u == "s1" && r == 7).then_some(SensorSnapshot { state: true, last_state_updated: 0.0 })
    };
    let firing = evaluate_level(&level, &mut state, &clock_at(0.0), &sensors);
    assert_eq!(firing, Some(0.0));
    assert!(!state.rules[0].finalized);
}

#[test]
fn sequenced_rule_requires_minimum_gap() {
    let mut rules = vec![sensor_rule(1, "s1", 7)];
    let mut second = sensor_rule(2, "s1", 8);
    second.min_time_after_prev = 1.0;
    second.max_time_after_prev = 5.0;
    rules.push(second);
    let level = level_with(rules);
    let mut state = level.new_eval_state();

    let sensors = |u: &str, r: i64| -> Option<SensorSnapshot> {
        match (u, r) {
            ("s1", 7) => Some(SensorSnapshot { state: true, last_state_updated: 0.0 }),
            ("s1", 8) => Some(SensorSnapshot { state: true, last_state_updated: 0.5 }),
            _ => None,
        }
    };
    // s1/8 fires too soon (delta 0.5 < min 1.0): no firing.
    let firing = evaluate_level(&level, &mut state, &clock_at(0.5), &sensors);
    assert_eq!(firing, None);
    assert!(!state.rules[1].finalized);
}

#[test]
fn sequenced_rule_fires_within_window() {
    let mut rules = vec![sensor_rule(1, "s1", 7)];
    let second = sensor_rule(2, "s1", 8);
    rules.push(second);
    let level = level_with(rules);
    let mut state = level.new_eval_state();

    let sensors_first = |u: &str, r: i64| -> Option<SensorSnapshot> {
        (u == "s1" && r == 7).then_some(SensorSnapshot { state: true, last_state_updated: 0.0 })
    };
    evaluate_level(&level, &mut state, &clock_at(0.0), &sensors_first);
    assert!(state.rules[0].finalized);

    let sensors_second = |u: &str, r: i64| -> Option<SensorSnapshot> {
        match (u, r) {
            ("s1", 7) => Some(SensorSnapshot { state: true, last_state_updated: 0.0 }),
            ("s1", 8) => Some(SensorSnapshot { state: true, last_state_updated: 2.0 }),
            _ => None,
        }
    };
    let firing = evaluate_level(&level, &mut state, &clock_at(2.0), &sensors_second);
    assert_eq!(firing, Some(2.0));
}

#[test]
fn chain_resets_after_window_expires() {
    let mut rules = vec![sensor_rule(1, "s1", 7)];
    rules.push(sensor_rule(2, "s1", 8));
    let level = level_with(rules);
    let mut state = level.new_eval_state();

    let only_first = |u: &str, r: i64| -> Option<SensorSnapshot> {
        (u == "s1" && r == 7).then_some(SensorSnapshot { state: true, last_state_updated: 0.0 })
    };
    evaluate_level(&level, &mut state, &clock_at(0.0), &only_first);
    assert!(state.rules[0].finalized);

    // No successor event arrives; well past max_time_after_prev (5.0).
    evaluate_level(&level, &mut state, &clock_at(7.0), &only_first);
    assert!(!state.rules[1].finalized);
}

#[test]
fn counter_cap_suppresses_third_firing() {
    let mut rule = sensor_rule(1, "s1", 7);
    rule.min_time_after_prev = 0.0;
    rule.max_time_after_prev = 0.0;
    rule.counter_activated = true;
    rule.counter_limit = 2;
    rule.counter_wait_time = 60.0;
    let level = level_with(vec![rule]);
    let mut state = level.new_eval_state();

    let sensors = |u: &str, r: i64| -> Option<SensorSnapshot> {
        (u == "s1" && r == 7).then_some(SensorSnapshot { state: true, last_state_updated: 0.0 })
    };

    assert!(evaluate_level(&level, &mut state, &clock_at(0.0), &sensors).is_some());
    assert!(evaluate_level(&level, &mut state, &clock_at(10.0), &sensors).is_some());
    assert!(evaluate_level(&level, &mut state, &clock_at(20.0), &sensors).is_none());
}
