// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Notifier` contract.
//!
//! Best-effort by design: a failure is logged and never propagated to the
//! caller.

pub mod smtp;

use async_trait::async_trait;

/// Out-of-band admin alerting, consulted by the connection watchdog and the
/// sensor-alert executer.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A persistent node has been unreachable for `fail_count` consecutive
    /// watchdog sweeps.
    async fn send_communication_alert(&self, node_username: &str, fail_count: u32);

    /// The node from a prior `send_communication_alert` has reconnected,
    /// debounced until resolved by reconnection, which emits a clear.
    async fn send_communication_alert_clear(&self, node_username: &str);

    /// An alert level with `smtpActivated` fired.
    async fn send_sensor_alert(&self, level: i64, level_name: &str, to_addr: &str);
}

#[cfg(test)]
pub use test_support::MockNotifier;

#[cfg(test)]
mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts calls instead of sending anything, for watchdog/executer tests.
    #[derive(Default)]
    pub struct MockNotifier {
        alerts: AtomicUsize,
        clears: AtomicUsize,
        sensor_alerts: AtomicUsize,
    }

    impl MockNotifier {
        pub fn communication_alerts(&self) -> usize {
            self.alerts.load(Ordering::Relaxed)
        }

        pub fn communication_clears(&self) -> usize {
            self.clears.load(Ordering::Relaxed)
        }

        pub fn sensor_alerts(&self) -> usize {
            self.sensor_alerts.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send_communication_alert(&self, _node_username: &str, _fail_count: u32) {
            self.alerts.fetch_add(1, Ordering::Relaxed);
        }

        async fn send_communication_alert_clear(&self, _node_username: &str) {
            self.clears.fetch_add(1, Ordering::Relaxed);
        }

        async fn send_sensor_alert(&self, _level: i64, _level_name: &str, _to_addr: &str) {
            self.sensor_alerts.fetch_add(1, Ordering::Relaxed);
        }
    }
}
