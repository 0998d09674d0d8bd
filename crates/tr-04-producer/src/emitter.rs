//! WebSocket emitter.
//!
//! Connects to the hub as a producer and waits for commands. `startEmitting`
//! sends one batch at once and then one per interval; `stopEmitting` or a
//! dropped connection ends emission. Lost connections are retried a bounded
//! number of times.

use crate::config::ProducerConfig;
use crate::error::ProducerError;
use crate::generator::BatchBuilder;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared_types::{shutdown_requested, WireEvent};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Effect of a start/stop command on the emission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    /// Start while emitting, or stop while idle.
    Unchanged,
}

/// Per-connection emission flag.
#[derive(Debug, Default)]
pub struct EmissionState {
    emitting: bool,
}

impl EmissionState {
    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    pub fn apply(&mut self, start: bool) -> Transition {
        match (self.emitting, start) {
            (false, true) => {
                self.emitting = true;
                Transition::Started
            }
            (true, false) => {
                self.emitting = false;
                Transition::Stopped
            }
            _ => Transition::Unchanged,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

pub struct Emitter {
    config: ProducerConfig,
    builder: BatchBuilder,
    rng: StdRng,
    batches_sent: u64,
}

impl Emitter {
    pub fn new(config: ProducerConfig, builder: BatchBuilder) -> Self {
        Self {
            config,
            builder,
            rng: StdRng::from_entropy(),
            batches_sent: 0,
        }
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    /// Connect and serve hub commands until `shutdown` flips to true.
    ///
    /// After a lost connection, up to `reconnect_attempts` connects are tried
    /// `reconnect_delay` apart; the counter resets after each successful one,
    /// however the session that followed it ended.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ProducerError> {
        let mut failures = 0u32;
        loop {
            info!(component = "producer", url = %self.config.listener_url, "Connecting to hub");
            let connected = tokio::select! {
                connected = connect_async(self.config.listener_url.as_str()) => connected,
                _ = shutdown_requested(&mut shutdown) => return Ok(()),
            };

            match connected {
                Ok((ws, _)) => {
                    failures = 0;
                    match self.session(ws, &mut shutdown).await {
                        Ok(SessionEnd::Shutdown) => return Ok(()),
                        Ok(SessionEnd::Disconnected) => {
                            info!(component = "producer", "Disconnected from hub");
                        }
                        Err(e) => {
                            warn!(component = "producer", error = %e, "Session ended with error");
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        component = "producer",
                        error = %e,
                        attempt = failures,
                        max_attempts = self.config.reconnect_attempts,
                        "Connection failed"
                    );
                    if failures >= self.config.reconnect_attempts {
                        return Err(ProducerError::ReconnectExhausted { attempts: failures });
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown_requested(&mut shutdown) => return Ok(()),
            }
        }
    }

    async fn session(
        &mut self,
        ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, ProducerError> {
        info!(component = "producer", "Connected, waiting for start command");
        let (mut write, mut read) = ws.split();

        let mut state = EmissionState::default();
        let mut ticker: Option<Interval> = None;

        let end = loop {
            tokio::select! {
                message = read.next() => {
                    let text = match message {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => break SessionEnd::Disconnected,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            debug!(component = "producer", error = %e, "Receive error");
                            break SessionEnd::Disconnected;
                        }
                    };

                    let Some(start) = WireEvent::from_json(&text)
                        .ok()
                        .and_then(|event| event.requested_emitting())
                    else {
                        debug!(component = "producer", "Ignoring unexpected frame");
                        continue;
                    };

                    match state.apply(start) {
                        Transition::Started => {
                            info!(
                                component = "producer",
                                interval_ms = self.config.emit_interval.as_millis() as u64,
                                "Start emitting"
                            );
                            self.emit(&mut write).await?;
                            let mut interval = tokio::time::interval_at(
                                Instant::now() + self.config.emit_interval,
                                self.config.emit_interval,
                            );
                            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            ticker = Some(interval);
                        }
                        Transition::Stopped => {
                            info!(component = "producer", "Stop emitting");
                            ticker = None;
                        }
                        Transition::Unchanged => {
                            debug!(component = "producer", start, "Command does not change state");
                        }
                    }
                }
                _ = next_tick(&mut ticker) => {
                    self.emit(&mut write).await?;
                }
                _ = shutdown_requested(shutdown) => {
                    let _ = write.send(Message::Close(None)).await;
                    break SessionEnd::Shutdown;
                }
            }
        };

        if state.is_emitting() {
            info!(component = "producer", "Emission stopped with connection");
        }
        Ok(end)
    }

    async fn emit<S>(&mut self, write: &mut S) -> Result<(), ProducerError>
    where
        S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let batch = self.builder.build(&mut self.rng)?;
        let frame = WireEvent::DataStream(batch.payload).to_json()?;
        write.send(Message::Text(frame)).await?;
        self.batches_sent += 1;
        info!(
            component = "producer",
            messages = batch.count,
            batches_sent = self.batches_sent,
            "Emitted data stream"
        );
        Ok(())
    }
}

/// Resolves on the next tick, or never while not emitting.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
