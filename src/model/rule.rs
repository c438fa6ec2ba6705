// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rule-tree configuration and its parallel evaluation-state tree.
//!
//! `AlertLevelConfig`/`RuleStartConfig`/`RuleElementConfig` are parsed once
//! at startup (`crate::config::xml`) and shared read-only via `Arc` for the
//! lifetime of the process. `LevelEvalState`/`RuleEvalState`/
//! `ElementEvalState` are the parallel, single-writer mutable tree that
//! `SensorAlertExecuter` owns exclusively.
//!
//! Each `RuleElementConfig` carries a stable `eval_id`, assigned once at
//! parse time by walking the tree depth-first. `RuleEvalState::elements` is
//! a flat `Vec<ElementEvalState>` indexed by that id, rather than the
//! mutable fields living on the tree nodes themselves — this is what keeps
//! the config tree genuinely immutable and shareable.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// `local` or `utc`, per the calendar rule grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneRef {
    Local,
    Utc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleBooleanConfig {
    pub op: BooleanOp,
    pub children: Vec<RuleElementConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSensorConfig {
    pub username: String,
    pub remote_sensor_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleWeekdayConfig {
    pub time: TimeZoneRef,
    pub weekday: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMonthdayConfig {
    pub time: TimeZoneRef,
    pub monthday: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleHourConfig {
    pub time: TimeZoneRef,
    pub start: u8,
    pub end: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMinuteConfig {
    pub start: u8,
    pub end: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleSecondConfig {
    pub start: u8,
    pub end: u8,
}

/// The `body` of a `RuleElement`: exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleElementKind {
    Boolean(RuleBooleanConfig),
    Sensor(RuleSensorConfig),
    Weekday(RuleWeekdayConfig),
    Monthday(RuleMonthdayConfig),
    Hour(RuleHourConfig),
    Minute(RuleMinuteConfig),
    Second(RuleSecondConfig),
}

/// A node in the rule tree. `eval_id` indexes into the matching
/// `RuleEvalState::elements` of whichever rule owns this tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleElementConfig {
    pub eval_id: usize,
    pub kind: RuleElementKind,
    /// Sensor-only: seconds a sensor must hold `triggered` continuously
    /// to count. Zero for every other kind.
    pub time_triggered_for: f64,
}

impl RuleElementConfig {
    /// Largest `eval_id` reachable from this subtree, inclusive.
    fn max_eval_id(&self) -> usize {
        let mut max = self.eval_id;
        if let RuleElementKind::Boolean(b) = &self.kind {
            for child in &b.children {
                max = max.max(child.max_eval_id());
            }
        }
        max
    }

    /// Number of `eval_id` slots this subtree occupies. Used to size
    /// `RuleEvalState::elements` once the whole tree has been assigned ids.
    pub fn slot_count(&self) -> usize {
        self.max_eval_id() + 1
    }
}

/// A `RuleStart`: one step in an alert level's ordered rule sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStartConfig {
    pub order: i64,
    pub min_time_after_prev: f64,
    pub max_time_after_prev: f64,
    pub counter_activated: bool,
    pub counter_limit: i64,
    pub counter_wait_time: f64,
    pub body: RuleElementConfig,
}

impl RuleStartConfig {
    pub fn new_eval_state(&self) -> RuleEvalState {
        RuleEvalState {
            finalized: false,
            time_when_triggered: 0.0,
            counter: 0,
            counter_hits: VecDeque::new(),
            elements: vec![ElementEvalState::default(); self.body.slot_count()],
        }
    }
}

/// An `AlertLevel`, immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertLevelConfig {
    pub level: i64,
    pub name: String,
    pub trigger_always: bool,
    pub smtp_activated: bool,
    pub to_addr: String,
    pub rules_activated: bool,
    /// Ordered by `RuleStartConfig::order`, ascending.
    pub rules: Vec<RuleStartConfig>,
}

impl AlertLevelConfig {
    pub fn new_eval_state(&self) -> LevelEvalState {
        LevelEvalState { rules: self.rules.iter().map(RuleStartConfig::new_eval_state).collect() }
    }
}

/// Mutable evaluation state of one `RuleElement`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ElementEvalState {
    pub triggered: bool,
    pub time_when_triggered: f64,
}

/// Mutable evaluation state of one `RuleStart`, written exclusively by the
/// rule-evaluation executer.
#[derive(Debug, Clone)]
pub struct RuleEvalState {
    pub finalized: bool,
    pub time_when_triggered: f64,
    pub counter: i64,
    pub counter_hits: VecDeque<f64>,
    pub elements: Vec<ElementEvalState>,
}

impl RuleEvalState {
    pub fn element(&self, eval_id: usize) -> ElementEvalState {
        self.elements[eval_id]
    }

    pub fn set_element(&mut self, eval_id: usize, state: ElementEvalState) {
        self.elements[eval_id] = state;
    }

    /// Drop the finalized outcome but preserve counter history: a fresh
    /// evaluation of this rule starts clean while still counting toward the
    /// firing cap.
    pub fn reset_finalization(&mut self) {
        self.finalized = false;
        self.time_when_triggered = 0.0;
    }
}

/// Mutable evaluation state of a whole `AlertLevel`'s rule sequence,
/// indexed in parallel with `AlertLevelConfig::rules`.
#[derive(Debug, Clone)]
pub struct LevelEvalState {
    pub rules: Vec<RuleEvalState>,
}
