// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-connection read loop: handshake then steady-state dispatch.
//! Grounded on `crates/cli/src/transport/ws.rs`'s
//! `handle_connection`/`handle_client_message` split — one function owns
//! the outer loop, a second is a pure match over message variants.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ProtocolError;
use crate::model::node::NodeType;
use crate::model::{Alert, Manager, Node, Sensor, SensorAlert};
use crate::notifier::Notifier;
use crate::protocol::{Ack, ClientMessage, FrameCodec, ResultCode, ServerMessage};
use crate::registry::SessionRegistry;
use crate::storage::Storage;
use crate::user_backend::UserBackend;

use super::state::SessionState;
use super::{next_session_id, BoxedWriter, SessionHandle};

/// Everything a connection handler needs from the rest of the process.
pub struct SessionDeps {
    pub storage: Arc<dyn Storage>,
    pub user_backend: Arc<dyn UserBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub registry: Arc<SessionRegistry>,
    pub clock: Arc<dyn Clock>,
    /// Signalled whenever a `SensorAlert` is appended, so the rule-evaluation
    /// executer wakes promptly instead of waiting for its coarse periodic
    /// tick.
    pub sensor_alert_signal: Arc<Notify>,
    /// Signalled whenever authoritative state changes, so the manager-update
    /// executer can coalesce toward the next `status` fan-out.
    pub manager_dirty_signal: Arc<Notify>,
    /// The server's own protocol major version, checked against `regversion`.
    pub protocol_major_version: i64,
    pub server_receive_timeout: Duration,
    /// Timeout an `AsyncSender` waits for the peer's `Ack`.
    pub async_reply_timeout: Duration,
}

enum IncomingFrame {
    Client(ClientMessage),
    Ack(Ack),
}

/// An incoming frame is an `Ack` iff it carries a `result` field — the one
/// field no `ClientMessage` variant defines (only replies carry `result`).
///
/// On failure the original value is handed back alongside the error so a
/// caller can still pull `clientTime` out of it for a reply, even though the
/// typed decode never got far enough to produce one.
fn classify_frame(value: serde_json::Value) -> Result<IncomingFrame, (ProtocolError, serde_json::Value)> {
    if value.get("result").is_some() {
        match serde_json::from_value(value.clone()) {
            Ok(ack) => Ok(IncomingFrame::Ack(ack)),
            Err(_) => Err((ProtocolError::TypeMismatch, value)),
        }
    } else {
        match serde_json::from_value(value.clone()) {
            Ok(msg) => Ok(IncomingFrame::Client(msg)),
            Err(e) => Err((classify_decode_error(&e), value)),
        }
    }
}

fn classify_decode_error(err: &serde_json::Error) -> ProtocolError {
    match missing_field(err) {
        Some(name) => ProtocolError::MissingField(name),
        None => ProtocolError::TypeMismatch,
    }
}

/// Best-effort extraction of the field name out of serde_json's
/// `missing field \`name\`` error text, for the `expected <field>` reply.
fn missing_field(err: &serde_json::Error) -> Option<String> {
    let text = err.to_string();
    let after = text.split("missing field `").nth(1)?;
    let name = after.split('`').next()?;
    Some(name.to_owned())
}

/// Best-effort `clientTime` recovery from a frame whose typed decode failed,
/// so an `expected <field>` reply can still echo it back.
fn client_time_of(value: &serde_json::Value) -> f64 {
    value.get("clientTime").and_then(serde_json::Value::as_f64).unwrap_or(0.0)
}

async fn read_frame<R>(
    reader: &mut FramedRead<R, FrameCodec<serde_json::Value>>,
    timeout: Duration,
) -> Option<serde_json::Value>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, reader.next()).await {
        Ok(Some(Ok(value))) => Some(value),
        _ => None,
    }
}

async fn send<W>(
    writer: &mut FramedWrite<W, FrameCodec<serde_json::Value>>,
    message: &ServerMessage,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    match serde_json::to_value(message) {
        Ok(value) => writer.send(value).await.is_ok(),
        Err(_) => false,
    }
}

/// Drive one accepted connection end to end: handshake, then steady-state
/// dispatch until the peer disconnects, times out, or is evicted.
pub async fn handle_connection<S>(stream: S, deps: Arc<SessionDeps>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader: FramedRead<_, FrameCodec<serde_json::Value>> =
        FramedRead::new(read_half, FrameCodec::new());
    let mut writer: FramedWrite<_, FrameCodec<serde_json::Value>> =
        FramedWrite::new(write_half, FrameCodec::new());

    let mut state = SessionState::Accepted;

    // -- step 1: regversion ---------------------------------------------
    let Some(value) = read_frame(&mut reader, deps.server_receive_timeout).await else { return };
    let (client_time, peer_version, peer_rev) = match classify_frame(value) {
        Ok(IncomingFrame::Client(ClientMessage::Regversion { client_time, version, rev })) => {
            state = match state.advance(SessionState::Versioned) {
                Ok(s) => s,
                Err(_) => return,
            };
            let major = version.trunc() as i64;
            if major != deps.protocol_major_version {
                let _ = send(
                    &mut writer,
                    &ServerMessage::Regversion { client_time, result: ResultCode::Versionmisfit },
                )
                .await;
                return;
            }
            let _ =
                send(&mut writer, &ServerMessage::Regversion { client_time, result: ResultCode::Ok })
                    .await;
            (client_time, version, rev)
        }
        _ => return,
    };

    // -- step 2: authentication -------------------------------------------
    let Some(value) = read_frame(&mut reader, deps.server_receive_timeout).await else { return };
    let (username, allowed_type) = match classify_frame(value) {
        Ok(IncomingFrame::Client(ClientMessage::Authentication { client_time, username, password })) => {
            match deps.user_backend.authenticate(&username, &password).await {
                Some(node_type) => {
                    state = match state.advance(SessionState::Authenticated) {
                        Ok(s) => s,
                        Err(_) => return,
                    };
                    let _ = send(
                        &mut writer,
                        &ServerMessage::Authentication { client_time, result: ResultCode::Ok },
                    )
                    .await;
                    (username, node_type)
                }
                None => {
                    let _ = send(
                        &mut writer,
                        &ServerMessage::Authentication { client_time, result: ResultCode::Expired },
                    )
                    .await;
                    return;
                }
            }
        }
        _ => return,
    };

    // -- step 3: registration ----------------------------------------------
    let Some(value) = read_frame(&mut reader, deps.server_receive_timeout).await else { return };
    let (node_type, hostname, instance, persistent, sensors, alerts, description) =
        match classify_frame(value) {
            Ok(IncomingFrame::Client(ClientMessage::Registration {
                client_time,
                hostname,
                node_type,
                instance,
                persistent,
                sensors,
                alerts,
                description,
            })) => {
                if node_type != allowed_type {
                    let _ = send(
                        &mut writer,
                        &ServerMessage::Registration {
                            client_time,
                            result: ResultCode::Typemisfit,
                            field: None,
                        },
                    )
                    .await;
                    return;
                }
                state = match state.advance(SessionState::Registered) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                (node_type, hostname, instance, persistent, sensors, alerts, description)
            }
            Err((ProtocolError::MissingField(field), value)) => {
                let _ = send(
                    &mut writer,
                    &ServerMessage::Registration {
                        client_time: client_time_of(&value),
                        result: ResultCode::Expected,
                        field: Some(field),
                    },
                )
                .await;
                return;
            }
            _ => return,
        };

    let now = deps.clock.now_unix();
    let node = Node {
        id: 0,
        hostname,
        node_type,
        instance,
        version: peer_version,
        rev: peer_rev,
        username: username.clone(),
        persistent,
        connected: true,
    };
    let node_id = match deps.storage.upsert_node(node).await {
        Ok(id) => id,
        Err(e) => {
            warn!("failed to upsert node {username}: {e}");
            return;
        }
    };

    for s in &sensors {
        let sensor = Sensor {
            id: 0,
            node_id,
            remote_sensor_id: s.remote_sensor_id,
            description: s.description.clone(),
            state: false,
            last_state_updated: now,
            alert_delay: s.alert_delay,
            alert_levels: s.alert_levels.clone(),
            data_type: s.data_type,
            data: crate::model::sensor::DataValue::None,
        };
        if let Err(e) = deps.storage.upsert_sensor(sensor).await {
            warn!("failed to upsert sensor for {username}: {e}");
        }
    }
    for a in &alerts {
        let alert = Alert {
            id: 0,
            node_id,
            remote_alert_id: a.remote_alert_id,
            description: a.description.clone(),
            alert_levels: a.alert_levels.clone(),
        };
        if let Err(e) = deps.storage.upsert_alert(alert).await {
            warn!("failed to upsert alert for {username}: {e}");
        }
    }
    if node_type == NodeType::Manager {
        let manager = Manager { id: 0, node_id, description };
        if let Err(e) = deps.storage.upsert_manager(manager).await {
            warn!("failed to upsert manager for {username}: {e}");
        }
    }
    if let Err(e) = deps.storage.set_node_connected(node_id, true).await {
        warn!("failed to mark node {username} connected: {e}");
    }

    let reg_client_time = client_time;
    let _ = send(
        &mut writer,
        &ServerMessage::Registration { client_time: reg_client_time, result: ResultCode::Ok, field: None },
    )
    .await;

    let write_half: BoxedWriter = Box::new(writer.into_inner());
    let handle = Arc::new(SessionHandle::new(next_session_id(), username.clone(), node_type, write_half));
    handle.node_id.store(node_id, std::sync::atomic::Ordering::Relaxed);
    handle.touch(now);
    let _ = handle.advance(SessionState::Active);
    deps.registry.register(Arc::clone(&handle)).await;
    handle.start_async_sender(deps.async_reply_timeout);

    // Post-handshake sync: push a full `status` so the peer's view starts
    // consistent, and for managers signal the manager-update executer for
    // an immediate fan-out to every other connected manager too.
    if let Ok(snapshot) = deps.storage.snapshot().await {
        let _ = handle
            .write_message(&ServerMessage::Status {
                client_time: deps.clock.now_unix(),
                result: ResultCode::Ok,
                nodes: snapshot.nodes,
                sensors: snapshot.sensors,
                alerts: snapshot.alerts,
                managers: snapshot.managers,
            })
            .await;
    }
    if node_type == NodeType::Manager {
        deps.manager_dirty_signal.notify_one();
    }

    info!(username = username.as_str(), node_type = node_type.as_str(), "session active");

    steady_state(&mut reader, &handle, &deps).await;

    deps.registry.unregister(&handle).await;
    handle.close();
    if let Err(e) = deps.storage.set_node_connected(node_id, false).await {
        warn!("failed to mark node {username} disconnected: {e}");
    }
    if node_type == NodeType::Manager {
        deps.manager_dirty_signal.notify_one();
    }
    info!(username = username.as_str(), "session closed");
}

async fn steady_state<R>(
    reader: &mut FramedRead<R, FrameCodec<serde_json::Value>>,
    handle: &Arc<SessionHandle>,
    deps: &Arc<SessionDeps>,
) where
    R: AsyncRead + Unpin,
{
    let cancel = handle.cancellation();
    loop {
        let value = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = tokio::time::timeout(deps.server_receive_timeout, reader.next()) => {
                match frame {
                    Ok(Some(Ok(value))) => value,
                    _ => return,
                }
            }
        };

        match classify_frame(value) {
            Ok(IncomingFrame::Ack(ack)) => {
                handle.touch(deps.clock.now_unix());
                handle.deliver_ack(ack);
            }
            Ok(IncomingFrame::Client(message)) => {
                handle.touch(deps.clock.now_unix());
                if !handle_client_message(message, handle, deps).await {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}

/// Handle one steady-state `ClientMessage`. Returns `false` when the
/// session should close.
async fn handle_client_message(
    message: ClientMessage,
    handle: &Arc<SessionHandle>,
    deps: &Arc<SessionDeps>,
) -> bool {
    match message {
        ClientMessage::Ping { client_time } => {
            handle.write_message(&ServerMessage::Ping { client_time, result: ResultCode::Ok }).await.is_ok()
        }
        ClientMessage::Sensoralert {
            client_time,
            remote_sensor_id,
            state,
            has_optional_data,
            optional_data,
            change_state,
            has_latest_data,
            data_type,
            data,
        } => {
            let sensor = deps.storage.find_sensor_by_username(&handle.username, remote_sensor_id).await;
            let Ok(Some(sensor)) = sensor else {
                let _ = handle
                    .write_message(&ServerMessage::Sensorerror {
                        client_time,
                        result: ResultCode::Error,
                        message: "unknown sensor".into(),
                    })
                    .await;
                return true;
            };
            let alert = SensorAlert {
                id: 0,
                sensor_id: sensor.id,
                node_id: handle.node_id.load(std::sync::atomic::Ordering::Relaxed),
                state,
                has_optional_data,
                optional_data: optional_data.clone(),
                change_state,
                has_latest_data,
                data_type,
                data,
                alert_levels: sensor.alert_levels.clone(),
                time_received: deps.clock.now_unix(),
            };
            if let Err(e) = deps.storage.append_sensor_alert(alert).await {
                warn!("failed to append sensor alert: {e}");
            } else {
                deps.sensor_alert_signal.notify_one();
            }
            handle
                .write_message(&ServerMessage::Sensoralert {
                    client_time,
                    result: ResultCode::Ok,
                    alert_levels: sensor.alert_levels,
                    remote_sensor_id,
                    state,
                    optional_data,
                })
                .await
                .is_ok()
        }
        ClientMessage::Statechange { client_time, remote_sensor_id, state, data_type: _, data } => {
            let sensor = deps.storage.find_sensor_by_username(&handle.username, remote_sensor_id).await;
            if let Ok(Some(sensor)) = sensor {
                if let Err(e) =
                    deps.storage.update_sensor_state(sensor.id, state, data, deps.clock.now_unix()).await
                {
                    warn!("failed to update sensor state: {e}");
                }
                deps.manager_dirty_signal.notify_one();
            }
            handle
                .write_message(&ServerMessage::Statechange { client_time, result: ResultCode::Ok })
                .await
                .is_ok()
        }
        ClientMessage::Sensoralertsoff { client_time, remote_alert_id: _ } => handle
            .write_message(&ServerMessage::Sensoralertsoff { client_time, result: ResultCode::Ok })
            .await
            .is_ok(),
        ClientMessage::Option { client_time, option_name, value: _, time_delay } => {
            let ok = handle
                .write_message(&ServerMessage::Option { client_time, result: ResultCode::Ok })
                .await
                .is_ok();
            if ok && time_delay > 0.0 {
                let handle = Arc::clone(handle);
                let delay = Duration::from_secs_f64(time_delay.max(0.0));
                let clock = Arc::clone(&deps.clock);
                let reply_timeout = deps.async_reply_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let message = ServerMessage::Option { client_time: clock.now_unix(), result: ResultCode::Ok };
                    let _ = handle.push(message, reply_timeout).await;
                });
            }
            let _ = option_name;
            ok
        }
        // `regversion`/`authentication`/`registration` only belong to the
        // handshake; seeing one again mid-session is a protocol error, same
        // as any other unknown message — close with error.
        ClientMessage::Regversion { .. }
        | ClientMessage::Authentication { .. }
        | ClientMessage::Registration { .. } => false,
    }
}
