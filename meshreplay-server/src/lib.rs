// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Meshreplay service-logic node.
//!
//! One process per simulated microservice. Each node accepts trace packets
//! over HTTP, plays its own hop of the call graph (self-cost, storage
//! operations, calls into peer nodes) and reports how many packets it still
//! has in flight.

pub mod api;
pub mod config;
pub mod liveness;
pub mod peer_client;
pub mod router;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use meshreplay_storage::{
    DriverKind, MemoryConnector, NativeConnector, ShimLayer, StorageConnector,
};
use meshreplay_telemetry::{init_tracing, SinkConfig, TelemetrySink};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use api::{accept_packet, status, AppState};
use config::NodeConfig;
use peer_client::PeerClient;
use router::{NodeRouter, RouterSettings};

/// Default `RUST_LOG` filter for the node binary.
pub const DEFAULT_LOG_FILTER: &str = "meshreplay_server=info,meshreplay_storage=info,tower_http=info";

/// Routes of the node's HTTP surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(accept_packet))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire a node from its configuration. Must run inside a tokio runtime.
pub fn build_state(config: &NodeConfig) -> Result<AppState> {
    let connector: Arc<dyn StorageConnector> = match config.storage.driver {
        DriverKind::Native => Arc::new(NativeConnector::new(
            config.storage.clone(),
            config.peers.clone(),
        )),
        DriverKind::Memory => {
            tracing::info!("Using in-memory storage backend");
            Arc::new(MemoryConnector::new())
        }
    };

    let telemetry = TelemetrySink::spawn(SinkConfig {
        log_dir: config.telemetry.log_dir.clone(),
        channel_capacity: config.telemetry.channel_capacity,
    });

    build_state_with(config, connector, telemetry)
}

/// Like [`build_state`] with an explicit storage connector and sink.
pub fn build_state_with(
    config: &NodeConfig,
    connector: Arc<dyn StorageConnector>,
    telemetry: TelemetrySink,
) -> Result<AppState> {
    let shim = ShimLayer::new(connector, &config.storage);
    let peers = PeerClient::new(config.peers.clone(), config.request_timeout())?;
    let settings = RouterSettings {
        payload_bytes: config.node.payload_bytes,
        record_data_ops: config.telemetry.record_data_ops,
    };

    let router = NodeRouter::new(
        config.node_id()?,
        config.self_cost()?,
        Arc::new(shim),
        peers,
        telemetry,
        settings,
    );

    Ok(AppState {
        router: Arc::new(router),
    })
}

/// Serve `state` on an already-bound listener until the future is dropped.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).await
}

pub async fn run_server(config: NodeConfig) -> Result<()> {
    init_tracing(DEFAULT_LOG_FILTER, config.telemetry.log_format);

    tracing::info!("Starting Meshreplay node");
    tracing::debug!("Configuration: {:#?}", config);

    // Validate configuration
    config.validate()?;

    let state = build_state(&config)?;
    let router = Arc::clone(&state.router);
    tracing::info!(
        node = %router.node_id(),
        log_dir = ?config.telemetry.log_dir,
        driver = ?config.storage.driver,
        "Node ready"
    );

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        in_flight = router.liveness().in_flight(),
        "Shutting down, flushing telemetry"
    );
    router.telemetry().flush().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
