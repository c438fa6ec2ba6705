// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// An alert owned by a [`super::Node`] of type `alert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    pub node_id: i64,
    pub remote_alert_id: i64,
    pub description: String,
    pub alert_levels: Vec<i64>,
}

/// A manager owned by a [`super::Node`] of type `manager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub id: i64,
    pub node_id: i64,
    pub description: String,
}
