// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TLS listener and connection Acceptor.
//!
//! Grounded on the registry/acceptor split of `crates/cli/src/broker/registry.rs`
//! (register/deregister keyed lookup, generalized here from pod names to
//! `(username, NodeType)`), with the TLS stack pinned to `tokio-rustls = "0.26"`,
//! `rustls = "0.23"`, and `rustls-pemfile = "2"`.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::session::run::{handle_connection, SessionDeps};

/// The server's own protocol major version, checked against `regversion`.
/// Mirrors `alertRserver.py`'s single `self.version` constant compared
/// against the client's reported version at handshake time.
pub const PROTOCOL_MAJOR_VERSION: i64 = 1;

/// Default `serverReceiveTimeout`, matching `alertRserver.py`'s
/// `self.serverReceiveTimeout = 20.0`.
pub const SERVER_RECEIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout an `AsyncSender` waits for a peer's `Ack` to a server-initiated
/// push. Reuses the same receive timeout budget a session enforces on its
/// own reads.
pub const ASYNC_REPLY_TIMEOUT: Duration = Duration::from_secs(20);

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening cert file {path}"))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parsing cert file {path}"))
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening key file {path}"))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("parsing key file {path}"))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {path}"))
}

fn build_tls_config(config: &ServerConfig) -> Result<rustls::ServerConfig> {
    let certs = load_certs(&config.cert_file)?;
    let key = load_private_key(&config.key_file)?;

    let builder = rustls::ServerConfig::builder();
    let builder = if config.use_client_certificates {
        let ca_path = config
            .client_ca_file
            .as_deref()
            .context("useClientCertificates=true requires a clientCAFile")?;
        let mut roots = RootCertStore::empty();
        for cert in load_certs(ca_path)? {
            roots.add(cert).context("adding client CA certificate")?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .context("building client certificate verifier")?;
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    builder
        .with_single_cert(certs, key)
        .context("loading server certificate/key into rustls config")
}

/// The TLS listener and session wiring needed to drive every accepted
/// connection through [`handle_connection`].
pub struct Server {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    deps: Arc<SessionDeps>,
}

impl Server {
    pub async fn bind(config: &ServerConfig, deps: Arc<SessionDeps>) -> Result<Self> {
        let tls_config = build_tls_config(config)?;
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("binding TCP listener on port {}", config.port))?;
        info!(port = config.port, "listening for connections");
        Ok(Self { listener, acceptor: TlsAcceptor::from(Arc::new(tls_config)), deps })
    }

    /// Accept connections until `cancel` fires, handing each one its own
    /// task so a Session runs on its own worker of execution.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("acceptor shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("failed to accept connection: {e}");
                            continue;
                        }
                    };
                    let acceptor = self.acceptor.clone();
                    let deps = Arc::clone(&self.deps);
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => handle_connection(tls_stream, deps).await,
                            Err(e) => warn!(%peer, "TLS handshake failed: {e}"),
                        }
                    });
                }
            }
        }
    }
}
