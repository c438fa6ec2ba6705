// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Kind of remote peer connected to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Sensor,
    Alert,
    Manager,
    Server,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Alert => "alert",
            Self::Manager => "manager",
            Self::Server => "server",
        }
    }
}

/// A remote node registered through the handshake.
///
/// Persistent nodes cause the server to treat disconnection as an
/// operational fault, surfaced via [`crate::notifier::Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: i64,
    pub hostname: String,
    pub node_type: NodeType,
    pub instance: String,
    pub version: f64,
    pub rev: i64,
    pub username: String,
    pub persistent: bool,
    pub connected: bool,
}
