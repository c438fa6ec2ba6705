// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AsyncSender`: carries a single outbound message for a session without
//! blocking that session's reader.
//!
//! Grounded on `crates/cli/src/broker/distributor.rs`'s semaphore-gated
//! concurrent-push pattern, narrowed from "up to `MAX_CONCURRENT` pods in
//! flight" to "exactly one send in flight per session": a dedicated task
//! drains a per-session queue one job at a time, spawning each send as its
//! own one-shot task so a single slow or wedged peer never blocks the next
//! queued push from starting its own lifecycle (timeout, retry
//! bookkeeping) — it only delays when that push actually *runs*.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::protocol::{Ack, ServerMessage};

use super::{SessionError, SessionHandle};

const QUEUE_CAPACITY: usize = 32;

struct QueuedSend {
    message: ServerMessage,
    reply_to: oneshot::Sender<Result<Ack, SessionError>>,
}

/// Handle to a session's outbound work queue. Cloning is cheap; every clone
/// enqueues onto the same underlying channel.
#[derive(Clone)]
pub struct AsyncSenderQueue {
    tx: mpsc::Sender<QueuedSend>,
}

impl AsyncSenderQueue {
    /// Spawn the queue-draining task for `session` and return a handle to
    /// enqueue work onto it. The task exits once every clone of the
    /// returned handle (and the queue itself) is dropped.
    pub fn spawn(session: Arc<SessionHandle>, reply_timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueuedSend>(QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let session = Arc::clone(&session);
                let task = tokio::spawn(async move {
                    session.send_and_wait(&job.message, reply_timeout).await
                });
                let result = match task.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("async sender task panicked: {e}");
                        Err(SessionError::Closed)
                    }
                };
                let _ = job.reply_to.send(result);
            }
        });
        Self { tx }
    }

    /// Enqueue `message` for delivery and await the peer's `Ack` (or the
    /// failure that ended the attempt). Returns `Err` immediately if the
    /// queue is full or the draining task has exited (session closed).
    pub async fn send(&self, message: ServerMessage) -> Result<Ack, SessionError> {
        let (reply_to, reply_rx) = oneshot::channel();
        if self.tx.send(QueuedSend { message, reply_to }).await.is_err() {
            return Err(SessionError::Closed);
        }
        reply_rx.await.unwrap_or(Err(SessionError::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeType;
    use crate::protocol::ResultCode;
    use crate::session::next_session_id;

    #[tokio::test]
    async fn delivers_and_resolves_via_deliver_ack() {
        let session = Arc::new(SessionHandle::new(
            next_session_id(),
            "alice".into(),
            NodeType::Manager,
            Box::new(tokio::io::sink()),
        ));
        let queue = AsyncSenderQueue::spawn(Arc::clone(&session), Duration::from_secs(1));

        let send = queue.send(ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok });
        let deliver = async {
            // Give the spawned send task a chance to register the pending slot.
            for _ in 0..50 {
                tokio::task::yield_now().await;
            }
            session.deliver_ack(Ack { client_time: 0.0, message: "ping".into(), result: ResultCode::Ok });
        };
        let (result, ()) = tokio::join!(send, deliver);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn times_out_without_an_ack() {
        let session = Arc::new(SessionHandle::new(
            next_session_id(),
            "alice".into(),
            NodeType::Manager,
            Box::new(tokio::io::sink()),
        ));
        let queue = AsyncSenderQueue::spawn(session, Duration::from_millis(20));
        let result = queue.send(ServerMessage::Ping { client_time: 0.0, result: ResultCode::Ok }).await;
        assert_eq!(result, Err(SessionError::Timeout));
    }
}
