//! # Control Dispatcher
//!
//! Single task that owns the producer link and the emitting flag. Connection
//! handlers and HTTP routes talk to it through a [`ControlHandle`].
//!
//! - A newly registered producer replaces the previous one.
//! - A disconnect clears the link only if it comes from the current producer.
//! - Start/stop from any source sets the flag and is relayed when a producer
//!   is connected; otherwise it waits for the next producer.

use crate::domain::error::HubError;
use relay_telemetry::CONTROL_COMMANDS;
use serde::Serialize;
use shared_types::{ConnectionId, WireEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Queue depth of the control dispatcher.
pub const DEFAULT_CONTROL_QUEUE: usize = 32;

/// Where a start/stop command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    WebSocket,
    Http,
}

impl CommandSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandSource::WebSocket => "ws",
            CommandSource::Http => "http",
        }
    }
}

/// Published view of the control state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStatus {
    pub is_emitting: bool,
    pub producer_connected: bool,
}

#[derive(Debug)]
enum ControlCommand {
    ProducerConnected {
        id: ConnectionId,
        tx: mpsc::Sender<WireEvent>,
    },
    ProducerDisconnected {
        id: ConnectionId,
    },
    SetEmitting {
        emitting: bool,
        source: CommandSource,
        reply: oneshot::Sender<ControlStatus>,
    },
}

struct ProducerLink {
    id: ConnectionId,
    tx: mpsc::Sender<WireEvent>,
}

impl ProducerLink {
    fn relay(&self, event: WireEvent) {
        let name = event.name();
        match self.tx.try_send(event) {
            Ok(()) => debug!(component = "hub", producer = %self.id, event = name, "Relayed to producer"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(component = "hub", producer = %self.id, event = name, "Producer queue full, command dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(component = "hub", producer = %self.id, event = name, "Producer already gone")
            }
        }
    }
}

/// State owned by the dispatcher task.
#[derive(Default)]
struct ControlState {
    producer: Option<ProducerLink>,
    emitting: bool,
}

impl ControlState {
    fn status(&self) -> ControlStatus {
        ControlStatus {
            is_emitting: self.emitting,
            producer_connected: self.producer.is_some(),
        }
    }

    fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ProducerConnected { id, tx } => {
                let link = ProducerLink { id, tx };
                if self.emitting {
                    link.relay(WireEvent::StartEmitting);
                }
                if let Some(previous) = self.producer.replace(link) {
                    info!(component = "hub", previous = %previous.id, current = %id, "Producer replaced");
                } else {
                    info!(component = "hub", producer = %id, resumed = self.emitting, "Producer registered");
                }
            }
            ControlCommand::ProducerDisconnected { id } => match &self.producer {
                Some(current) if current.id == id => {
                    self.producer = None;
                    info!(component = "hub", producer = %id, "Producer unregistered");
                }
                _ => debug!(component = "hub", producer = %id, "Ignoring disconnect of replaced producer"),
            },
            ControlCommand::SetEmitting {
                emitting,
                source,
                reply,
            } => {
                let command = if emitting { "start" } else { "stop" };
                CONTROL_COMMANDS
                    .with_label_values(&[command, source.as_str()])
                    .inc();

                self.emitting = emitting;
                match &self.producer {
                    Some(link) => link.relay(if emitting {
                        WireEvent::StartEmitting
                    } else {
                        WireEvent::StopEmitting
                    }),
                    None => info!(
                        component = "hub",
                        command,
                        source = source.as_str(),
                        "No producer connected, command deferred"
                    ),
                }
                let _ = reply.send(self.status());
            }
        }
    }
}

/// Cloneable handle to the control dispatcher.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
    status: watch::Receiver<ControlStatus>,
}

impl ControlHandle {
    /// Make `tx` the authoritative producer channel.
    pub async fn producer_connected(
        &self,
        id: ConnectionId,
        tx: mpsc::Sender<WireEvent>,
    ) -> Result<(), HubError> {
        self.send(ControlCommand::ProducerConnected { id, tx }).await
    }

    pub async fn producer_disconnected(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(ControlCommand::ProducerDisconnected { id }).await
    }

    /// Set the emitting flag and relay it. Returns the status after the change.
    pub async fn set_emitting(
        &self,
        emitting: bool,
        source: CommandSource,
    ) -> Result<ControlStatus, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetEmitting {
            emitting,
            source,
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError::ControlClosed)
    }

    /// Latest published status.
    pub fn status(&self) -> ControlStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlStatus> {
        self.status.clone()
    }

    async fn send(&self, command: ControlCommand) -> Result<(), HubError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| HubError::ControlClosed)
    }
}

/// Start the control dispatcher. It runs until `shutdown` flips to true or
/// every handle is dropped.
pub fn spawn_control_dispatcher(
    queue_capacity: usize,
    shutdown: watch::Receiver<bool>,
) -> (ControlHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let (status_tx, status_rx) = watch::channel(ControlStatus::default());
    let task = tokio::spawn(run(rx, status_tx, shutdown));
    (
        ControlHandle {
            tx,
            status: status_rx,
        },
        task,
    )
}

async fn run(
    mut rx: mpsc::Receiver<ControlCommand>,
    status: watch::Sender<ControlStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut state = ControlState::default();
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => {
                    state.apply(command);
                    status.send_replace(state.status());
                }
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!(component = "hub", "Control dispatcher stopped");
}
