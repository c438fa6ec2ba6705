// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection session state and its `AsyncSender` outbound queue.
//!
//! Resolves the cyclic session↔server references problem by having
//! [`SessionRegistry`](crate::registry::SessionRegistry) hold sessions
//! behind a stable `id`, while a [`SessionHandle`] never reaches back into
//! the registry itself — callers that need to evict a session go through
//! the registry directly.

pub mod async_sender;
pub mod run;
pub mod state;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, OnceLock};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::error::ProtocolError;
use crate::model::node::NodeType;
use crate::protocol::{Ack, FrameCodec, ServerMessage};

pub use async_sender::AsyncSenderQueue;
pub use state::SessionState;

/// A boxed half-duplex writer, so [`SessionHandle`] stays generic over
/// whether the underlying transport is a real TLS stream or, in tests, an
/// in-memory duplex pipe.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Error surfaced by a write or a server-initiated request/reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error("peer did not reply before the timeout")]
    Timeout,
    #[error("i/o error writing to the session")]
    Io,
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Everything the rest of the core needs to address and push to one
/// connected peer.
pub struct SessionHandle {
    pub id: u64,
    pub username: String,
    pub node_type: NodeType,
    /// Storage id of the registered node, set once `registration` completes.
    pub node_id: AtomicI64,
    state: StdMutex<SessionState>,
    /// Unix seconds of the last successfully processed message from the
    /// peer, read by the watchdog.
    last_recv: StdMutex<f64>,
    cancel: CancellationToken,
    writer: AsyncMutex<FramedWrite<BoxedWriter, FrameCodec<serde_json::Value>>>,
    /// The single in-flight reply slot for a server-initiated push — this
    /// protocol never pipelines. Only ever `Some` between an `AsyncSender`'s
    /// write and its matching `Ack`.
    pending_reply: StdMutex<Option<oneshot::Sender<Ack>>>,
    /// This session's outbound work queue, installed once the handshake
    /// completes. The rule-evaluation and manager-update executers reach it
    /// through [`SessionHandle::push`] rather than holding their own
    /// reference to it.
    async_sender: OnceLock<AsyncSenderQueue>,
}

impl SessionHandle {
    pub fn new(id: u64, username: String, node_type: NodeType, writer: BoxedWriter) -> Self {
        Self {
            id,
            username,
            node_type,
            node_id: AtomicI64::new(0),
            state: StdMutex::new(SessionState::Accepted),
            last_recv: StdMutex::new(0.0),
            cancel: CancellationToken::new(),
            writer: AsyncMutex::new(FramedWrite::new(writer, FrameCodec::new())),
            pending_reply: StdMutex::new(None),
            async_sender: OnceLock::new(),
        }
    }

    /// Start this session's outbound work queue. A no-op if already started
    /// (reconnection handling never re-installs one).
    pub fn start_async_sender(self: &std::sync::Arc<Self>, reply_timeout: Duration) {
        let _ = self.async_sender.set(AsyncSenderQueue::spawn(std::sync::Arc::clone(self), reply_timeout));
    }

    /// Push a server-initiated message through this session's `AsyncSender`
    /// queue, falling back to a direct `send_and_wait` if the queue was
    /// never started (e.g. a bare test handle).
    pub async fn push(&self, message: ServerMessage, timeout: Duration) -> Result<Ack, SessionError> {
        match self.async_sender.get() {
            Some(queue) => queue.send(message).await,
            None => self.send_and_wait(&message, timeout).await,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, next: SessionState) -> Result<SessionState, ProtocolError> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let resolved = guard.advance(next)?;
        *guard = resolved;
        Ok(resolved)
    }

    pub fn touch(&self, now: f64) {
        *self.last_recv.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn last_recv(&self) -> f64 {
        *self.last_recv.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Force-close this session: superseded on re-registration, or evicted
    /// by the watchdog.
    pub fn close(&self) {
        let _ = self.advance(SessionState::Closed);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed || self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Write a message without waiting for a reply — used for the session's
    /// own request/response replies, and for unsolicited pushes like the
    /// post-handshake `status`. All writes use a per-session write mutex.
    pub async fn write_message(&self, message: &ServerMessage) -> Result<(), SessionError> {
        use futures_util::SinkExt;
        let value = serde_json::to_value(message).map_err(|_| SessionError::Io)?;
        let mut writer = self.writer.lock().await;
        writer.send(value).await.map_err(|_| SessionError::Io)
    }

    /// Send a server-initiated request and wait for the peer's [`Ack`]: the
    /// `AsyncSender` acquires the session's write mutex, writes the message,
    /// then reads the reply under the same mutex. Holding `writer` for the
    /// whole call is what makes "exactly one `AsyncSender` active per
    /// session at a time" true without a separate queue lock.
    pub async fn send_and_wait(
        &self,
        message: &ServerMessage,
        timeout: Duration,
    ) -> Result<Ack, SessionError> {
        use futures_util::SinkExt;
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let value = serde_json::to_value(message).map_err(|_| SessionError::Io)?;
        let mut writer = self.writer.lock().await;
        let (tx, rx) = oneshot::channel();
        *self.pending_reply.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        if writer.send(value).await.is_err() {
            *self.pending_reply.lock().unwrap_or_else(|e| e.into_inner()) = None;
            return Err(SessionError::Io);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                *self.pending_reply.lock().unwrap_or_else(|e| e.into_inner()) = None;
                Err(SessionError::Timeout)
            }
        }
    }

    /// Deliver an `Ack` frame read off the peer's stream to whichever
    /// `send_and_wait` is currently waiting, if any. Called from the
    /// session's own read loop, never from `AsyncSender` itself — this is a
    /// short, lock-free-of-`writer` handoff so the read loop is never
    /// blocked behind an in-flight `AsyncSender`; the reader must not block
    /// on outbound sends.
    pub fn deliver_ack(&self, ack: Ack) {
        if let Some(tx) = self.pending_reply.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(ack);
        }
    }
}

pub fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Arc;

    /// A registered-but-idle session handle for registry tests: no peer
    /// ever reads from the other end, so every write silently succeeds.
    pub fn test_handle(username: &str, node_type: NodeType) -> Arc<SessionHandle> {
        Arc::new(SessionHandle::new(
            next_session_id(),
            username.to_owned(),
            node_type,
            Box::new(tokio::io::sink()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol::ResultCode;

    fn handle() -> SessionHandle {
        SessionHandle::new(1, "alice".into(), NodeType::Manager, Box::new(tokio::io::sink()))
    }

    #[tokio::test]
    async fn send_and_wait_resolves_on_matching_ack() {
        let h = handle();
        let msg = ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok };
        let send = h.send_and_wait(&msg, Duration::from_secs(1));
        // `send_and_wait` writes to a sink, so delivering the ack must be
        // done concurrently with awaiting the reply.
        let (result, ()) = tokio::join!(send, async {
            // give the writer a chance to register the pending slot
            tokio::task::yield_now().await;
            h.deliver_ack(Ack { client_time: 0.0, message: "ping".into(), result: ResultCode::Ok });
        });
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_and_wait_times_out_without_an_ack() {
        let h = handle();
        let msg = ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok };
        let result = h.send_and_wait(&msg, Duration::from_millis(20)).await;
        assert_eq!(result, Err(SessionError::Timeout));
    }

    #[tokio::test]
    async fn push_routes_through_the_installed_async_sender() {
        let h = Arc::new(handle());
        h.start_async_sender(Duration::from_secs(1));
        let msg = ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok };
        let send = h.push(msg, Duration::from_secs(1));
        let (result, ()) = tokio::join!(send, async {
            tokio::task::yield_now().await;
            h.deliver_ack(Ack { client_time: 0.0, message: "ping".into(), result: ResultCode::Ok });
        });
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn closing_rejects_further_sends() {
        let h = handle();
        h.close();
        let msg = ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok };
        let result = h.send_and_wait(&msg, Duration::from_millis(20)).await;
        assert_eq!(result, Err(SessionError::Closed));
    }
}
