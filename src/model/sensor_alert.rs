// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use super::sensor::{DataType, DataValue};

/// A raw sensor alert event, stored durably until the rule-evaluation
/// executer consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAlert {
    pub id: i64,
    pub sensor_id: i64,
    pub node_id: i64,
    pub state: bool,
    pub has_optional_data: bool,
    pub optional_data: Option<serde_json::Value>,
    pub change_state: bool,
    pub has_latest_data: bool,
    pub data_type: DataType,
    pub data: DataValue,
    pub alert_levels: Vec<i64>,
    pub time_received: f64,
}

/// One evaluation outcome: an alert level whose rules (or `triggerAlways`)
/// produced a firing this pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertLevelFiring {
    pub level: i64,
    /// `(username, remoteSensorId)` pairs behind the sensors this firing is
    /// about. See DESIGN.md for how this is reconstructed for the
    /// rules-activated path.
    pub triggered_sensors: Vec<(String, i64)>,
    pub timestamp: f64,
}
