// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable wall-clock abstraction.
//!
//! Calendar rule predicates must consult local and UTC time at the moment
//! of evaluation, and tests must be able to pin that moment. Everything
//! that reads "now" in the rule engine goes through this trait instead of
//! calling `chrono::Utc::now()` directly.

use chrono::{DateTime, Local, Utc};

/// Source of wall-clock time, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
    fn now_local(&self) -> DateTime<Local>;

    /// Seconds since the Unix epoch, the unit used throughout the data model
    /// (`lastStateUpdated`, `timeWhenTriggered`, `timeReceived`).
    fn now_unix(&self) -> f64 {
        self.now_utc().timestamp_millis() as f64 / 1000.0
    }
}

/// Real wall-clock time, backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
pub use test_support::FixedClock;

#[cfg(test)]
mod test_support {
    use super::*;
    use std::sync::RwLock;

    /// A clock pinned to an explicit instant, advanceable by tests.
    pub struct FixedClock {
        utc: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn new(utc: DateTime<Utc>) -> Self {
            Self { utc: RwLock::new(utc) }
        }

        pub fn advance(&self, duration: chrono::Duration) {
            let mut guard = self.utc.write().unwrap_or_else(|e| e.into_inner());
            *guard += duration;
        }

        pub fn set(&self, utc: DateTime<Utc>) {
            let mut guard = self.utc.write().unwrap_or_else(|e| e.into_inner());
            *guard = utc;
        }
    }

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            *self.utc.read().unwrap_or_else(|e| e.into_inner())
        }

        fn now_local(&self) -> DateTime<Local> {
            self.now_utc().with_timezone(&Local)
        }
    }
}
