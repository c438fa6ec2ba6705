// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The boolean/calendar/sensor rule evaluator and rule-sequencing state
//! machine.

use chrono::{DateTime, Datelike, Local, Timelike, Utc};

use crate::model::rule::{
    AlertLevelConfig, BooleanOp, ElementEvalState, LevelEvalState, RuleElementConfig,
    RuleElementKind, RuleEvalState, RuleStartConfig, TimeZoneRef,
};

/// Evaluation-tick granularity used when `minTimeAfterPrev == maxTimeAfterPrev
/// == 0`: treated as "must be satisfied within the same coarse evaluation
/// tick" rather than requiring an exact floating-point zero delta.
pub const RULE_TICK: f64 = 1.0;

/// Current triggered-state of a sensor, as needed by a `sensor` predicate.
/// Supplied by the caller so this module stays free of any `Storage`
/// dependency.
#[derive(Debug, Clone, Copy)]
pub struct SensorSnapshot {
    pub state: bool,
    pub last_state_updated: f64,
}

/// Looks up the sensor a `RuleSensor` predicate refers to, by
/// `(username, remoteSensorId)`.
pub trait SensorLookup {
    fn lookup(&self, username: &str, remote_sensor_id: i64) -> Option<SensorSnapshot>;
}

impl<F: Fn(&str, i64) -> Option<SensorSnapshot>> SensorLookup for F {
    fn lookup(&self, username: &str, remote_sensor_id: i64) -> Option<SensorSnapshot> {
        self(username, remote_sensor_id)
    }
}

/// The point in time an evaluation pass runs at, pre-resolved into every
/// representation a calendar predicate might need.
#[derive(Debug, Clone, Copy)]
pub struct EvalClock {
    pub now_unix: f64,
    pub now_local: DateTime<Local>,
    pub now_utc: DateTime<Utc>,
}

fn in_range(value: u32, start: u8, end: u8) -> bool {
    let value = value as u8;
    value >= start && value <= end
}

/// Evaluate one `RuleElement` subtree, writing the result of every node
/// (not just the root) into `state` so boolean parents can read their
/// children's `time_when_triggered`.
fn eval_element(
    elem: &RuleElementConfig,
    clock: &EvalClock,
    sensors: &impl SensorLookup,
    state: &mut RuleEvalState,
) -> ElementEvalState {
    let result = match &elem.kind {
        RuleElementKind::Boolean(b) => {
            let child_states: Vec<ElementEvalState> =
                b.children.iter().map(|c| eval_element(c, clock, sensors, state)).collect();
            let triggered = match b.op {
                BooleanOp::And => child_states.iter().all(|c| c.triggered),
                BooleanOp::Or => child_states.iter().any(|c| c.triggered),
                BooleanOp::Not => !child_states.first().map(|c| c.triggered).unwrap_or(false),
            };
            let time_when_triggered = if !triggered {
                state.element(elem.eval_id).time_when_triggered
            } else if b.op == BooleanOp::Not {
                // A negation has no satisfying child to inherit a timestamp
                // from; stamp the instant it became true.
                clock.now_unix
            } else {
                child_states
                    .iter()
                    .filter(|c| c.triggered)
                    .map(|c| c.time_when_triggered)
                    .fold(0.0_f64, f64::max)
            };
            ElementEvalState { triggered, time_when_triggered }
        }
        RuleElementKind::Sensor(s) => {
            let snapshot = sensors.lookup(&s.username, s.remote_sensor_id);
            match snapshot {
                Some(snap) if snap.state => {
                    let held_for = (clock.now_unix - snap.last_state_updated).max(0.0);
                    let triggered = held_for >= elem.time_triggered_for;
                    let time_when_triggered = if triggered {
                        // The instant the continuous-duration requirement
                        // was first satisfied, not "now" — this is what
                        // makes inter-rule timing windows measure from the
                        // right moment.
                        snap.last_state_updated + elem.time_triggered_for
                    } else {
                        state.element(elem.eval_id).time_when_triggered
                    };
                    ElementEvalState { triggered, time_when_triggered }
                }
                _ => ElementEvalState {
                    triggered: false,
                    time_when_triggered: state.element(elem.eval_id).time_when_triggered,
                },
            }
        }
        RuleElementKind::Weekday(w) => {
            let wd = match w.time {
                TimeZoneRef::Local => clock.now_local.weekday().num_days_from_monday(),
                TimeZoneRef::Utc => clock.now_utc.weekday().num_days_from_monday(),
            };
            let triggered = wd == w.weekday as u32;
            ElementEvalState {
                triggered,
                time_when_triggered: if triggered {
                    clock.now_unix
                } else {
                    state.element(elem.eval_id).time_when_triggered
                },
            }
        }
        RuleElementKind::Monthday(m) => {
            let day = match m.time {
                TimeZoneRef::Local => clock.now_local.day(),
                TimeZoneRef::Utc => clock.now_utc.day(),
            };
            let triggered = day == m.monthday as u32;
            ElementEvalState {
                triggered,
                time_when_triggered: if triggered {
                    clock.now_unix
                } else {
                    state.element(elem.eval_id).time_when_triggered
                },
            }
        }
        RuleElementKind::Hour(h) => {
            let hour = match h.time {
                TimeZoneRef::Local => clock.now_local.hour(),
                TimeZoneRef::Utc => clock.now_utc.hour(),
            };
            let triggered = in_range(hour, h.start, h.end);
            ElementEvalState {
                triggered,
                time_when_triggered: if triggered {
                    clock.now_unix
                } else {
                    state.element(elem.eval_id).time_when_triggered
                },
            }
        }
        RuleElementKind::Minute(m) => {
            let triggered = in_range(clock.now_local.minute(), m.start, m.end);
            ElementEvalState {
                triggered,
                time_when_triggered: if triggered {
                    clock.now_unix
                } else {
                    state.element(elem.eval_id).time_when_triggered
                },
            }
        }
        RuleElementKind::Second(s) => {
            let triggered = in_range(clock.now_local.second(), s.start, s.end);
            ElementEvalState {
                triggered,
                time_when_triggered: if triggered {
                    clock.now_unix
                } else {
                    state.element(elem.eval_id).time_when_triggered
                },
            }
        }
    };
    state.set_element(elem.eval_id, result);
    result
}

/// Whether `delta` falls in `[min, max]`, with the zero/zero special case
/// resolved to "within one evaluation tick".
fn within_window(delta: f64, min: f64, max: f64) -> bool {
    if min == 0.0 && max == 0.0 {
        delta.abs() <= RULE_TICK
    } else {
        delta >= min && delta <= max
    }
}

/// Drop counter hits older than `counter_wait_time` relative to `now`.
fn prune_counter_hits(rule_state: &mut RuleEvalState, rule: &RuleStartConfig, now: f64) {
    while let Some(&front) = rule_state.counter_hits.front() {
        if now - front > rule.counter_wait_time {
            rule_state.counter_hits.pop_front();
        } else {
            break;
        }
    }
}

/// Run one rule-sequence pass for one alert level. Returns `Some(timestamp)` of the
/// final rule's `time_when_triggered` the pass the level's full sequence
/// finalizes, resetting that level's mutable state (counters preserved).
pub fn evaluate_level(
    level: &AlertLevelConfig,
    state: &mut LevelEvalState,
    clock: &EvalClock,
    sensors: &impl SensorLookup,
) -> Option<f64> {
    let mut body_results = Vec::with_capacity(level.rules.len());
    for (i, rule) in level.rules.iter().enumerate() {
        let root = eval_element(&rule.body, clock, sensors, &mut state.rules[i]);
        body_results.push(root);
    }

    for i in 0..level.rules.len() {
        let body = body_results[i];
        if !body.triggered {
            continue;
        }

        let predecessor_ok = if i == 0 {
            true
        } else {
            let prev = &state.rules[i - 1];
            prev.finalized
                && within_window(
                    clock.now_unix - prev.time_when_triggered,
                    level.rules[i].min_time_after_prev,
                    level.rules[i].max_time_after_prev,
                )
        };
        if !predecessor_ok {
            continue;
        }

        let rule = &level.rules[i];
        let rule_state = &mut state.rules[i];
        if rule.counter_activated {
            prune_counter_hits(rule_state, rule, clock.now_unix);
            if rule_state.counter_hits.len() as i64 >= rule.counter_limit {
                // Cap reached: this finalization is discarded.
                continue;
            }
            rule_state.counter_hits.push_back(clock.now_unix);
            rule_state.counter += 1;
        }
        rule_state.finalized = true;
        rule_state.time_when_triggered = body.time_when_triggered;
    }

    // Timeout reset: a finalized rule whose successor hasn't finalized
    // within the successor's maxTimeAfterPrev window resets the chain from
    // that successor onward.
    for i in 0..level.rules.len().saturating_sub(1) {
        let predecessor_finalized = state.rules[i].finalized;
        let predecessor_time = state.rules[i].time_when_triggered;
        let successor_finalized = state.rules[i + 1].finalized;
        if predecessor_finalized
            && !successor_finalized
            && clock.now_unix - predecessor_time > level.rules[i + 1].max_time_after_prev
        {
            for rule_state in &mut state.rules[i + 1..] {
                rule_state.reset_finalization();
            }
        }
    }

    let last = state.rules.last()?;
    if last.finalized {
        let timestamp = last.time_when_triggered;
        for rule_state in &mut state.rules {
            rule_state.reset_finalization();
        }
        Some(timestamp)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "rule_eval_tests.rs"]
mod tests;
