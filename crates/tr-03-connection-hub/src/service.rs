//! Hub service: wires store, pipeline and dispatchers together and serves the
//! WebSocket and HTTP routes.

use crate::domain::config::{HubConfig, StoreBackend};
use crate::domain::control::{
    spawn_control_dispatcher, CommandSource, ControlHandle, ControlStatus, DEFAULT_CONTROL_QUEUE,
};
use crate::domain::error::HubError;
use crate::domain::fanout::FanoutThrottle;
use crate::middleware::create_cors_layer;
use crate::ws::ws_handler;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeDelta, Utc};
use relay_telemetry::{gather_metrics, register_metrics};
use serde::{Deserialize, Serialize};
use shared_crypto::SecretKey;
use shared_types::{shutdown_requested, BucketSummary, MinuteKey, StatsSnapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tr_01_aggregation_store::{
    BucketStore, InMemoryBucketStore, RetentionSweeper, StoreHealth, SystemTimeSource, TimeSource,
};
use tr_02_ingest_pipeline::{
    spawn_ingest_dispatcher, IngestHandle, Pipeline, PipelineConfig, StatsTracker,
};
use tracing::{error, info, warn};

/// Shared state handed to every route and connection.
pub struct HubState {
    pub config: HubConfig,
    pub control: ControlHandle,
    pub ingest: IngestHandle,
    pub fanout: Arc<FanoutThrottle>,
    pub stats: Arc<StatsTracker>,
    pub store: Arc<dyn BucketStore>,
    pub clock: Arc<dyn TimeSource>,
    pub shutdown: watch::Receiver<bool>,
}

/// Running hub: background tasks plus the router built on top of them.
pub struct HubService {
    state: Arc<HubState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl HubService {
    /// Validate `config`, open the configured store and start the background
    /// tasks. Must be called inside a Tokio runtime.
    pub fn new(config: HubConfig) -> Result<Self, HubError> {
        config.validate()?;
        let store = open_store(&config)?;
        Self::with_components(config, store, Arc::new(SystemTimeSource))
    }

    /// Same as [`HubService::new`] with an injected store and clock.
    pub fn with_components(
        config: HubConfig,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, HubError> {
        config.validate()?;
        if let Err(e) = register_metrics() {
            warn!(component = "hub", error = %e, "Metrics registration failed");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(StatsTracker::new());
        let fanout = Arc::new(FanoutThrottle::new(config.fanout.channel_capacity));

        let pipeline = Pipeline::new(
            SecretKey::derive(&config.crypto.shared_secret),
            Arc::clone(&store),
            Arc::clone(&stats),
            fanout.clone(),
            Arc::clone(&clock),
            PipelineConfig {
                write_retries: config.store.write_retries,
            },
        );

        let (ingest, ingest_task) =
            spawn_ingest_dispatcher(pipeline, config.ingest.queue_capacity, shutdown_rx.clone());
        let (control, control_task) =
            spawn_control_dispatcher(DEFAULT_CONTROL_QUEUE, shutdown_rx.clone());
        let fanout_task = fanout.spawn(config.fanout.interval, shutdown_rx.clone());
        let sweeper_task = RetentionSweeper::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.store.retention,
        )
        .spawn(config.store.sweep_interval, shutdown_rx.clone());

        let state = Arc::new(HubState {
            config,
            control,
            ingest,
            fanout,
            stats,
            store,
            clock,
            shutdown: shutdown_rx,
        });

        Ok(Self {
            state,
            shutdown_tx: Arc::new(shutdown_tx),
            tasks: vec![ingest_task, control_task, fanout_task, sweeper_task],
        })
    }

    pub fn state(&self) -> Arc<HubState> {
        Arc::clone(&self.state)
    }

    /// Routes with CORS and request tracing applied.
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&self.state.config.cors));

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health))
            .route("/stats", get(stats))
            .route("/control/start", post(control_start))
            .route("/control/stop", post(control_stop))
            .route("/metrics", get(metrics))
            .route("/buckets/recent", get(recent_buckets))
            .layer(middleware)
            .with_state(self.state())
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn start(self, signal: impl Future<Output = ()> + Send + 'static) -> Result<(), HubError> {
        let addr = self.state.config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HubError::Bind { addr, source })?;
        self.serve(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves or
    /// [`HubService::shutdown`] is called, then drain the ingest queue, stop
    /// the background tasks and flush the store.
    pub async fn serve(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), HubError> {
        let addr = listener.local_addr().map_err(HubError::Server)?;
        info!(component = "hub", %addr, "Connection hub listening");

        let trigger = Arc::clone(&self.shutdown_tx);
        let mut stop = self.shutdown_tx.subscribe();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signal => {}
                    _ = shutdown_requested(&mut stop) => {}
                }
                trigger.send_replace(true);
            })
            .await
            .map_err(HubError::Server);

        if let Err(e) = &result {
            error!(component = "hub", error = %e, "Server stopped with error");
        }
        self.shutdown();
        self.join().await;
        info!(component = "hub", "Connection hub stopped");
        result
    }

    /// Ask the server and every background task to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(component = "hub", error = %e, "Background task failed");
            }
        }
        if let Err(e) = self.state.store.flush() {
            error!(component = "hub", error = %e, "Store flush failed");
        }
    }
}

fn open_store(config: &HubConfig) -> Result<Arc<dyn BucketStore>, HubError> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryBucketStore::new(config.bucket_policy()))),
        #[cfg(feature = "rocksdb")]
        StoreBackend::RocksDb => {
            use tr_01_aggregation_store::{RocksDbBucketConfig, RocksDbBucketStore};
            let rocks = RocksDbBucketConfig {
                path: config.store.data_dir.to_string_lossy().into_owned(),
                ..RocksDbBucketConfig::default()
            };
            Ok(Arc::new(RocksDbBucketStore::open(rocks, config.bucket_policy())?))
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::RocksDb => Err(HubError::Config(crate::domain::config::ConfigError::Invalid(
            "the rocksdb store backend requires the `rocksdb` feature".into(),
        ))),
    }
}

// =============================================================================
// HTTP ROUTES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    store_status: StoreHealth,
    stats: StatsSnapshot,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(flatten)]
    stats: StatsSnapshot,
    #[serde(flatten)]
    control: ControlStatus,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ControlResponse {
    success: bool,
    #[serde(flatten)]
    status: ControlStatus,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    minutes: Option<u32>,
}

/// Window used by `/buckets/recent` when `minutes` is absent.
const DEFAULT_RECENT_MINUTES: u32 = 60;

async fn health(State(state): State<Arc<HubState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        store_status: state.store.health(),
        stats: state.stats.snapshot(),
        timestamp: state.clock.now(),
    })
}

async fn stats(State(state): State<Arc<HubState>>) -> impl IntoResponse {
    Json(StatsResponse {
        stats: state.stats.snapshot(),
        control: state.control.status(),
        timestamp: state.clock.now(),
    })
}

async fn control_start(
    State(state): State<Arc<HubState>>,
) -> Result<Json<ControlResponse>, HubError> {
    set_emitting(&state, true).await
}

async fn control_stop(
    State(state): State<Arc<HubState>>,
) -> Result<Json<ControlResponse>, HubError> {
    set_emitting(&state, false).await
}

async fn set_emitting(state: &HubState, emitting: bool) -> Result<Json<ControlResponse>, HubError> {
    let status = state
        .control
        .set_emitting(emitting, CommandSource::Http)
        .await?;
    Ok(Json(ControlResponse {
        success: true,
        status,
    }))
}

async fn metrics() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn recent_buckets(
    State(state): State<Arc<HubState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<BucketSummary>>, HubError> {
    let minutes = query.minutes.unwrap_or(DEFAULT_RECENT_MINUTES);
    let since = state
        .clock
        .now()
        .checked_sub_signed(TimeDelta::minutes(i64::from(minutes)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let buckets = state.store.buckets_since(MinuteKey::from_datetime(since))?;
    Ok(Json(buckets.iter().map(|b| b.summary()).collect()))
}
