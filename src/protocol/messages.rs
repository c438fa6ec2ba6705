// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire message types for the protocol: every JSON object carries
//! `clientTime` and `message`, tagged internally on `message`.

use serde::{Deserialize, Serialize};

use crate::model::node::NodeType;
use crate::model::sensor::{DataType, DataValue};

/// The `result` field carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCode {
    Ok,
    Expired,
    Versionmisfit,
    Typemisfit,
    Reachedlimit,
    Expected,
    Error,
}

/// A peer's reply to a server-initiated push — both directions may
/// initiate messages. Carries no variant-specific payload because every
/// server-initiated message (`status`, `sensoralert`, `option`) only needs
/// an acknowledgement back, never a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub client_time: f64,
    pub message: String,
    pub result: ResultCode,
}

/// A registered sensor, sent in full by sensor nodes during `registration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRegistration {
    pub remote_sensor_id: i64,
    pub description: String,
    pub alert_delay: f64,
    pub alert_levels: Vec<i64>,
    pub data_type: DataType,
}

/// A registered alert, sent by alert nodes during `registration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRegistration {
    pub remote_alert_id: i64,
    pub description: String,
    pub alert_levels: Vec<i64>,
}

/// Payload-bearing messages a peer may send to this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Regversion {
        client_time: f64,
        version: f64,
        rev: i64,
    },
    Authentication {
        client_time: f64,
        username: String,
        password: String,
    },
    Registration {
        client_time: f64,
        hostname: String,
        node_type: NodeType,
        instance: String,
        persistent: bool,
        #[serde(default)]
        sensors: Vec<SensorRegistration>,
        #[serde(default)]
        alerts: Vec<AlertRegistration>,
        #[serde(default)]
        description: String,
    },
    Ping {
        client_time: f64,
    },
    Sensoralert {
        client_time: f64,
        remote_sensor_id: i64,
        state: bool,
        #[serde(default)]
        has_optional_data: bool,
        #[serde(default)]
        optional_data: Option<serde_json::Value>,
        change_state: bool,
        #[serde(default)]
        has_latest_data: bool,
        #[serde(default)]
        data_type: DataType,
        #[serde(default)]
        data: DataValue,
    },
    Statechange {
        client_time: f64,
        remote_sensor_id: i64,
        state: bool,
        #[serde(default)]
        data_type: DataType,
        #[serde(default)]
        data: DataValue,
    },
    Sensoralertsoff {
        client_time: f64,
        remote_alert_id: i64,
    },
    Option {
        client_time: f64,
        option_name: String,
        value: f64,
        #[serde(default)]
        time_delay: f64,
    },
}

/// Messages this server may send to a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Regversion {
        client_time: f64,
        result: ResultCode,
    },
    Authentication {
        client_time: f64,
        result: ResultCode,
    },
    Registration {
        client_time: f64,
        result: ResultCode,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
    Status {
        client_time: f64,
        result: ResultCode,
        nodes: Vec<crate::model::Node>,
        sensors: Vec<crate::model::Sensor>,
        alerts: Vec<crate::model::Alert>,
        managers: Vec<crate::model::Manager>,
    },
    Ping {
        client_time: f64,
        result: ResultCode,
    },
    Sensoralert {
        client_time: f64,
        result: ResultCode,
        alert_levels: Vec<i64>,
        remote_sensor_id: i64,
        state: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        optional_data: Option<serde_json::Value>,
    },
    Statechange {
        client_time: f64,
        result: ResultCode,
    },
    Sensoralertsoff {
        client_time: f64,
        result: ResultCode,
    },
    Option {
        client_time: f64,
        result: ResultCode,
    },
    Sensorerror {
        client_time: f64,
        result: ResultCode,
        message: String,
    },
}

impl ServerMessage {
    /// The message's `result`, for logging and tests.
    pub fn result(&self) -> ResultCode {
        match self {
            Self::Regversion { result, .. }
            | Self::Authentication { result, .. }
            | Self::Registration { result, .. }
            | Self::Status { result, .. }
            | Self::Ping { result, .. }
            | Self::Sensoralert { result, .. }
            | Self::Statechange { result, .. }
            | Self::Sensoralertsoff { result, .. }
            | Self::Option { result, .. }
            | Self::Sensorerror { result, .. } => *result,
        }
    }
}
