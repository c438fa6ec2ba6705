// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SMTP notifier, configured from `smtp/general` + `smtp/server`.

use lettre::message::Mailbox;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Message, Tokio1Executor};
use tracing::{error, warn};

use super::Notifier;

/// SMTP configuration, parsed from `smtp/general` + `smtp/server`.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub activated: bool,
    pub from_addr: String,
    /// Administrator address for watchdog communication alerts; distinct
    /// from a per-alert-level `toAddr` used for sensor alerts.
    pub admin_to_addr: String,
    pub host: String,
    pub port: u16,
}

/// SMTP-backed `Notifier`. Built once at startup from [`SmtpConfig`].
pub struct SmtpNotifier {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        let transport = config
            .activated
            .then(|| AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port).build());
        Self { config, transport }
    }

    async fn send(&self, to_addr: &str, subject: &str, body: String) {
        if !self.config.activated {
            return;
        }
        let Some(transport) = self.transport.as_ref() else { return };

        let to: Mailbox = match to_addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(to_addr, "invalid notifier recipient address: {e}");
                return;
            }
        };
        let from: Mailbox = match self.config.from_addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(from = self.config.from_addr.as_str(), "invalid notifier from address: {e}");
                return;
            }
        };

        let message = match Message::builder().from(from).to(to).subject(subject).body(body) {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to build notification message: {e}");
                return;
            }
        };

        if let Err(e) = transport.send(message).await {
            error!("smtp send failed: {e}");
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn send_communication_alert(&self, node_username: &str, fail_count: u32) {
        let to_addr = self.config.admin_to_addr.clone();
        self.send(
            &to_addr,
            &format!("node unreachable: {node_username}"),
            format!("node {node_username} has failed {fail_count} consecutive liveness checks"),
        )
        .await;
    }

    async fn send_communication_alert_clear(&self, node_username: &str) {
        let to_addr = self.config.admin_to_addr.clone();
        self.send(
            &to_addr,
            &format!("node reconnected: {node_username}"),
            format!("node {node_username} has reconnected"),
        )
        .await;
    }

    async fn send_sensor_alert(&self, level: i64, level_name: &str, to_addr: &str) {
        self.send(
            to_addr,
            &format!("alert level {level} triggered: {level_name}"),
            format!("alert level {level} ({level_name}) has fired"),
        )
        .await;
    }
}
