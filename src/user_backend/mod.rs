// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `UserBackend` contract.
//!
//! Consulted exactly once per session, during the `authentication` step of
//! the handshake. The flat-file CSV backend is the one concrete production
//! method named by `storage/userBackend {method="csv"}`.

pub mod csv_backend;

use async_trait::async_trait;

use crate::model::node::NodeType;

/// Credential + authorization lookup, consulted once per session handshake.
#[async_trait]
pub trait UserBackend: Send + Sync {
    /// Verify `(username, password)` and return the node type this user is
    /// allowed to register as, or `None` if the credentials are invalid.
    async fn authenticate(&self, username: &str, password: &str) -> Option<NodeType>;
}
