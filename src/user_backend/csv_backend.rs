// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat-file CSV credentials backend (`storage/userBackend {method="csv"}`).
//!
//! One record per line: `username,passwordHash,nodeType`. `passwordHash` is
//! a hex-encoded SHA-256 digest of the password; comparison is constant-time
//! to avoid leaking how many leading bytes matched.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::model::node::NodeType;

use super::UserBackend;

#[derive(Debug, Deserialize)]
struct Record {
    username: String,
    password_hash: String,
    node_type: NodeType,
}

/// Constant-time comparison of two equal-length hex digests.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn sha256_hex(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Credentials loaded from a CSV file at startup.
pub struct CsvUserBackend {
    users: HashMap<String, (String, NodeType)>,
}

impl CsvUserBackend {
    /// Load `username,passwordHash,nodeType` records from `path`.
    pub fn load(path: &Path) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
        let mut users = HashMap::new();
        for result in reader.deserialize() {
            let record: Record = result?;
            users.insert(record.username, (record.password_hash, record.node_type));
        }
        Ok(Self { users })
    }

    #[cfg(test)]
    pub fn from_entries(entries: Vec<(String, String, NodeType)>) -> Self {
        let users = entries.into_iter().map(|(u, h, t)| (u, (h, t))).collect();
        Self { users }
    }
}

#[async_trait]
impl UserBackend for CsvUserBackend {
    async fn authenticate(&self, username: &str, password: &str) -> Option<NodeType> {
        let (expected_hash, node_type) = self.users.get(username)?;
        let actual_hash = sha256_hex(password);
        if constant_time_eq(expected_hash, &actual_hash) {
            Some(*node_type)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_matching_password() {
        let backend = CsvUserBackend::from_entries(vec![(
            "s1".into(),
            sha256_hex("hunter2"),
            NodeType::Sensor,
        )]);
        assert_eq!(backend.authenticate("s1", "hunter2").await, Some(NodeType::Sensor));
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let backend = CsvUserBackend::from_entries(vec![(
            "s1".into(),
            sha256_hex("hunter2"),
            NodeType::Sensor,
        )]);
        assert_eq!(backend.authenticate("s1", "wrong").await, None);
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let backend = CsvUserBackend::from_entries(vec![]);
        assert_eq!(backend.authenticate("ghost", "anything").await, None);
    }
}
