// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Declared payload type of a sensor's optional data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    None,
    Int,
    Float,
}

/// A sensor's typed optional data value, tagged by [`DataType`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    #[default]
    None,
    Int(i64),
    Float(f64),
}

/// A sensor owned by a [`super::Node`].
///
/// `(username, remoteSensorId)` is unique across all sensors;
/// `remoteSensorId` is assigned by the node itself, not by this server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: i64,
    pub node_id: i64,
    pub remote_sensor_id: i64,
    pub description: String,
    pub state: bool,
    pub last_state_updated: f64,
    pub alert_delay: f64,
    pub alert_levels: Vec<i64>,
    pub data_type: DataType,
    pub data: DataValue,
}

impl Sensor {
    /// How long, in seconds, this sensor has continuously held its current
    /// `state` as of `now`.
    pub fn time_in_current_state(&self, now: f64) -> f64 {
        (now - self.last_state_updated).max(0.0)
    }
}
