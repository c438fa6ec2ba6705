// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use thiserror::Error;

/// Error raised by a [`crate::storage::Storage`] implementation.
///
/// Every variant is treated as transient by callers: the core never
/// interprets a storage failure as fatal, it logs and retries.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage record not found: {0}")]
    NotFound(String),
    #[error("storage backend rejected write: {0}")]
    Write(String),
}

/// Error raised while validating or applying a protocol message.
///
/// Maps onto the wire `result` field rather than an HTTP status, since this
/// protocol has no HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    VersionMismatch,
    AuthFailed,
    MissingField(String),
    TypeMismatch,
    ReachedLimit,
    Timeout,
    Unknown,
}

impl ProtocolError {
    /// The wire `result` string for this error.
    pub fn as_result(&self) -> &'static str {
        match self {
            Self::VersionMismatch => "versionmisfit",
            Self::AuthFailed => "expired",
            Self::MissingField(_) => "expected",
            Self::TypeMismatch => "typemisfit",
            Self::ReachedLimit => "reachedlimit",
            Self::Timeout => "error",
            Self::Unknown => "error",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "expected {name}"),
            other => f.write_str(other.as_result()),
        }
    }
}

/// Fatal configuration error. Causes the process to log and exit 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("malformed XML config: {0}")]
    Xml(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("duplicate rule order {0} within an alert level")]
    DuplicateRuleOrder(i64),
    #[error("duplicate alert level {0}")]
    DuplicateAlertLevel(i64),
    #[error("alert level {0} is referenced in storage but not defined in config")]
    UndefinedAlertLevel(i64),
}
