//! WebSocket connection handler.
//!
//! Each socket is split into a reader loop (this task) and a writer task.
//! Producers get a control channel from the dispatcher; observers get a
//! subscription to the fan-out broadcast.

use crate::domain::control::CommandSource;
use crate::service::HubState;
use crate::ws::connection::Connection;
use crate::ws::handshake::{resolve_role, HandshakeQuery, ROLE_HEADER};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use relay_telemetry::{log_connection_event, ACTIVE_CONNECTIONS};
use shared_types::{shutdown_requested, ConnectionId, ConnectionRole, WireEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Commands queued for one producer before the hub starts dropping them.
const PRODUCER_QUEUE: usize = 16;

/// What the writer task forwards to the socket.
enum Outbound {
    Control(mpsc::Receiver<WireEvent>),
    Broadcast(broadcast::Receiver<Arc<str>>),
}

/// `GET /ws` upgrade handler.
///
/// The role is checked before the upgrade so a bad handshake is a plain 400.
pub async fn ws_handler(
    State(state): State<Arc<HubState>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let header = headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok());
    let role = match resolve_role(query.role.as_deref(), header) {
        Ok(role) => role,
        Err(e) => {
            warn!(component = "hub", error = %e, "Rejected WebSocket handshake");
            return e.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let mut connection = Connection::new();
    connection.classify(role);
    ws.on_upgrade(move |socket| handle_socket(socket, connection, state))
}

async fn handle_socket(socket: WebSocket, mut connection: Connection, state: Arc<HubState>) {
    let id = connection.id();
    let Some(role) = connection.role() else {
        return;
    };
    let (sink, mut stream) = socket.split();

    let outbound = match role {
        ConnectionRole::Producer => {
            let (tx, rx) = mpsc::channel(PRODUCER_QUEUE);
            if let Err(e) = state.control.producer_connected(id, tx).await {
                warn!(component = "hub", connection_id = %id, error = %e, "Cannot register producer");
                return;
            }
            Outbound::Control(rx)
        }
        ConnectionRole::Observer => Outbound::Broadcast(state.fanout.subscribe()),
    };

    connection.activate();
    ACTIVE_CONNECTIONS.with_label_values(&[role.as_str()]).inc();
    log_connection_event!(info, "Client connected", id, role);

    let mut writer = tokio::spawn(write_loop(sink, outbound, id));
    let max_message_size = state.config.ingest.max_message_size;
    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(component = "hub", connection_id = %id, error = %e, "Receive error");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => {
                        if text.len() > max_message_size {
                            warn!(
                                component = "hub",
                                connection_id = %id,
                                size = text.len(),
                                limit = max_message_size,
                                "Dropping oversized message"
                            );
                            continue;
                        }
                        handle_text(&state, id, role, &text).await;
                    }
                    Message::Binary(_) => {
                        warn!(component = "hub", connection_id = %id, "Binary frames are not supported");
                    }
                    Message::Close(_) => break,
                    // Ping/pong is answered by the transport.
                    _ => {}
                }
            }
            _ = &mut writer => break,
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }

    writer.abort();
    if role == ConnectionRole::Producer {
        if let Err(e) = state.control.producer_disconnected(id).await {
            debug!(component = "hub", connection_id = %id, error = %e, "Control dispatcher gone");
        }
    }
    ACTIVE_CONNECTIONS.with_label_values(&[role.as_str()]).dec();
    connection.disconnect();
    log_connection_event!(info, "Client disconnected", id, role);
}

/// Route one inbound event according to the connection's role.
async fn handle_text(state: &HubState, id: ConnectionId, role: ConnectionRole, text: &str) {
    let event = match WireEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(component = "hub", connection_id = %id, error = %e, "Unparseable event");
            return;
        }
    };

    match (role, event) {
        (ConnectionRole::Producer, WireEvent::DataStream(batch)) => {
            if state.ingest.submit(batch).await.is_err() {
                warn!(component = "hub", connection_id = %id, "Ingest dispatcher closed, batch dropped");
            }
        }
        (ConnectionRole::Observer, event @ (WireEvent::StartEmitting | WireEvent::StopEmitting)) => {
            let emitting = matches!(event, WireEvent::StartEmitting);
            if let Err(e) = state
                .control
                .set_emitting(emitting, CommandSource::WebSocket)
                .await
            {
                warn!(component = "hub", connection_id = %id, error = %e, "Control command lost");
            }
        }
        (role, event) => {
            warn!(
                component = "hub",
                connection_id = %id,
                role = %role,
                event = event.name(),
                "Event not permitted for role"
            );
        }
    }
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, outbound: Outbound, id: ConnectionId) {
    match outbound {
        Outbound::Control(mut rx) => {
            while let Some(event) = rx.recv().await {
                let frame = match event.to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(component = "hub", connection_id = %id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
        }
        Outbound::Broadcast(mut rx) => loop {
            match rx.recv().await {
                Ok(frame) => {
                    if sink.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(component = "hub", connection_id = %id, skipped, "Observer lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        },
    }
    let _ = sink.close().await;
}
