//! Live hub over real sockets.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use futures::{SinkExt, StreamExt};
    use shared_types::WireEvent;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{oneshot, watch};
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::{self, Message};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tr_01_aggregation_store::{InMemoryBucketStore, SystemTimeSource};
    use tr_03_connection_hub::{CommandSource, ControlStatus, HubConfig, HubError, HubService, HubState};
    use tr_04_producer::{BatchBuilder, Emitter, ProducerConfig, SampleData};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    struct LiveHub {
        addr: SocketAddr,
        state: Arc<HubState>,
        stop: oneshot::Sender<()>,
        task: JoinHandle<Result<(), HubError>>,
    }

    impl LiveHub {
        async fn start() -> Self {
            let mut config = HubConfig::default();
            config.crypto.shared_secret = SHARED_SECRET.into();
            config.fanout.interval = Duration::from_millis(50);

            let service = HubService::with_components(
                config,
                Arc::new(InMemoryBucketStore::default()),
                Arc::new(SystemTimeSource),
            )
            .unwrap();
            let state = service.state();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (stop, stopped) = oneshot::channel::<()>();
            let task = tokio::spawn(service.serve(listener, async move {
                let _ = stopped.await;
            }));

            Self {
                addr,
                state,
                stop,
                task,
            }
        }

        async fn connect(&self, role: &str) -> Client {
            let url = format!("ws://{}/ws?role={role}", self.addr);
            connect_async(url).await.unwrap().0
        }

        async fn observer(&self) -> Client {
            let before = self.state.fanout.observer_count();
            let client = self.connect("observer").await;
            eventually("observer subscribed", || {
                self.state.fanout.observer_count() > before
            })
            .await;
            client
        }

        async fn wait_status(&self, check: impl Fn(&ControlStatus) -> bool) {
            let mut status = self.state.control.subscribe();
            tokio::time::timeout(WAIT, status.wait_for(|s| check(s)))
                .await
                .expect("timed out waiting for control status")
                .unwrap();
        }

        async fn wait_received(&self, at_least: u64) {
            eventually("envelopes counted", || {
                self.state.stats.snapshot().total_received >= at_least
            })
            .await;
        }

        async fn shutdown(self) {
            self.stop.send(()).unwrap();
            let result = tokio::time::timeout(WAIT, self.task).await.unwrap().unwrap();
            assert!(result.is_ok());
        }
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        let deadline = Instant::now() + WAIT;
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn send(client: &mut Client, event: WireEvent) {
        client
            .send(Message::Text(event.to_json().unwrap()))
            .await
            .unwrap();
    }

    async fn next_event(client: &mut Client) -> WireEvent {
        loop {
            let message = tokio::time::timeout(WAIT, client.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection closed")
                .unwrap();
            if let Message::Text(text) = message {
                return WireEvent::from_json(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_handshake_requires_known_role() {
        let hub = LiveHub::start().await;

        for url in [
            format!("ws://{}/ws", hub.addr),
            format!("ws://{}/ws?role=admin", hub.addr),
        ] {
            match connect_async(url).await {
                Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 400),
                other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
            }
        }

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_before_producer_is_resumed_on_connect() {
        let hub = LiveHub::start().await;
        let mut observer = hub.observer().await;

        send(&mut observer, WireEvent::StartEmitting).await;
        hub.wait_status(|s| s.is_emitting && !s.producer_connected)
            .await;

        let mut producer = hub.connect("producer").await;
        assert_eq!(next_event(&mut producer).await, WireEvent::StartEmitting);
        hub.wait_status(|s| s.producer_connected).await;

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_round_trip_to_observer() {
        let hub = LiveHub::start().await;
        let mut observer = hub.observer().await;
        let mut producer = hub.connect("producer").await;
        hub.wait_status(|s| s.producer_connected).await;

        let mut envelopes: Vec<String> = (0..5).map(|i| valid_envelope(&format!("p{i}"))).collect();
        envelopes.push(tampered_envelope());
        send(&mut producer, WireEvent::DataStream(batch_of(&envelopes))).await;

        hub.wait_received(6).await;
        eventually("batch finished", || {
            let stats = hub.state.stats.snapshot();
            stats.total_processed + stats.total_errors == 6
        })
        .await;
        let stats = hub.state.stats.snapshot();
        assert_eq!(stats.total_processed, 5);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.success_rate, 83.33);
        assert_eq!(hub.state.store.bucket_count().unwrap(), 1);

        match next_event(&mut observer).await {
            WireEvent::NewData(payload) => {
                assert!(payload.record.record.name.starts_with('p'));
                assert_eq!(payload.stats.total_received, 6);
            }
            other => panic!("expected newData, got {other:?}"),
        }

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_relay_to_producer() {
        let hub = LiveHub::start().await;
        let mut observer = hub.observer().await;
        let mut producer = hub.connect("producer").await;
        hub.wait_status(|s| s.producer_connected).await;

        send(&mut observer, WireEvent::StartEmitting).await;
        assert_eq!(next_event(&mut producer).await, WireEvent::StartEmitting);

        send(&mut observer, WireEvent::StopEmitting).await;
        assert_eq!(next_event(&mut producer).await, WireEvent::StopEmitting);

        let status = hub
            .state
            .control
            .set_emitting(true, CommandSource::Http)
            .await
            .unwrap();
        assert!(status.is_emitting && status.producer_connected);
        assert_eq!(next_event(&mut producer).await, WireEvent::StartEmitting);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_role_capabilities_enforced() {
        let hub = LiveHub::start().await;
        let mut producer = hub.connect("producer").await;
        hub.wait_status(|s| s.producer_connected).await;

        // Producers cannot toggle emission.
        send(&mut producer, WireEvent::StartEmitting).await;
        send(&mut producer, WireEvent::DataStream(valid_batch("p", 1))).await;
        hub.wait_received(1).await;
        assert!(!hub.state.control.status().is_emitting);

        // Observers cannot submit data.
        let mut observer = hub.observer().await;
        send(&mut observer, WireEvent::DataStream(valid_batch("o", 2))).await;
        send(&mut observer, WireEvent::StartEmitting).await;
        hub.wait_status(|s| s.is_emitting).await;
        assert_eq!(next_event(&mut producer).await, WireEvent::StartEmitting);

        send(&mut producer, WireEvent::DataStream(valid_batch("p2", 1))).await;
        hub.wait_received(2).await;
        assert_eq!(hub.state.stats.snapshot().total_received, 2);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_newer_producer_replaces_older() {
        let hub = LiveHub::start().await;
        let mut first = hub.connect("producer").await;
        hub.wait_status(|s| s.producer_connected).await;

        hub.state
            .control
            .set_emitting(true, CommandSource::Http)
            .await
            .unwrap();
        assert_eq!(next_event(&mut first).await, WireEvent::StartEmitting);

        // The resumed start proves the second producer is registered.
        let mut second = hub.connect("producer").await;
        assert_eq!(next_event(&mut second).await, WireEvent::StartEmitting);

        // The replaced producer is disconnected; its late disconnect is stale.
        let closed = tokio::time::timeout(WAIT, async {
            while let Some(Ok(message)) = first.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(closed.is_ok());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(hub.state.control.status().producer_connected);

        hub.state
            .control
            .set_emitting(false, CommandSource::Http)
            .await
            .unwrap();
        assert_eq!(next_event(&mut second).await, WireEvent::StopEmitting);

        second.close(None).await.unwrap();
        hub.wait_status(|s| !s.producer_connected).await;

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_emitter_against_live_hub() {
        let hub = LiveHub::start().await;
        let mut observer = hub.observer().await;

        let config = ProducerConfig {
            listener_url: format!("ws://{}/ws?role=producer", hub.addr),
            shared_secret: SHARED_SECRET.into(),
            emit_interval: Duration::from_millis(100),
            min_messages: 2,
            max_messages: 4,
            ..ProducerConfig::default()
        };
        let builder = BatchBuilder::new(
            key(),
            SampleData::default(),
            config.min_messages,
            config.max_messages,
        )
        .unwrap();
        let (producer_stop, producer_shutdown) = watch::channel(false);
        let producer = tokio::spawn(async move {
            let mut emitter = Emitter::new(config, builder);
            emitter
                .run(producer_shutdown)
                .await
                .map(|_| emitter.batches_sent())
        });

        hub.wait_status(|s| s.producer_connected).await;
        send(&mut observer, WireEvent::StartEmitting).await;

        match next_event(&mut observer).await {
            WireEvent::NewData(payload) => {
                assert!(SampleData::default()
                    .names
                    .contains(&payload.record.record.name));
            }
            other => panic!("expected newData, got {other:?}"),
        }
        // More than max_messages envelopes means at least two batches landed.
        hub.wait_received(5).await;

        send(&mut observer, WireEvent::StopEmitting).await;
        hub.wait_status(|s| !s.is_emitting).await;

        producer_stop.send(true).unwrap();
        let batches = producer.await.unwrap().unwrap();
        assert!(batches >= 2);
        hub.wait_status(|s| !s.producer_connected).await;

        let stats = hub.state.stats.snapshot();
        assert_eq!(stats.total_errors, 0);
        assert_eq!(stats.total_processed, stats.total_received);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_sockets() {
        let hub = LiveHub::start().await;
        let mut observer = hub.observer().await;
        let mut producer = hub.connect("producer").await;
        hub.wait_status(|s| s.producer_connected).await;

        hub.shutdown().await;

        for client in [&mut observer, &mut producer] {
            let closed = tokio::time::timeout(WAIT, async {
                while let Some(Ok(message)) = client.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            })
            .await;
            assert!(closed.is_ok());
        }
    }
}
