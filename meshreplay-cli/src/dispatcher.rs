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

//! Trace Dispatcher
//!
//! Injects a corpus at a target rate through a pool of send workers.
//!
//! ## Architecture
//!
//! ```text
//! injection loop ──send──► unbounded job channel ──► worker 0..N ──POST──► entry node
//!   │ sleep(interval - elapsed)      (Arc<Mutex<Receiver>>)
//!   └─ Dispatch telemetry row
//! ```
//!
//! The loop never waits on a send: a slow or unreachable entry node only
//! occupies a worker, and excess jobs queue in the channel. The achieved
//! rate is measured and reported rather than enforced.

use bytes::Bytes;
use meshreplay_core::{NodeId, PeerDirectory, TelemetryEvent, TelemetryEventKind};
use meshreplay_telemetry::TelemetrySink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::corpus::Corpus;
use crate::error::DispatchError;

/// Telemetry stream id of the dispatcher.
pub const DISPATCHER_NODE_ID: &str = "dispatcher";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Target packets per second
    pub rate: f64,
    /// Concurrent send workers
    pub workers: usize,
    /// Timeout of one packet submission
    pub send_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            rate: 50.0,
            workers: 20,
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(DispatchError::InvalidConfig(format!(
                "rate must be a positive number, got {}",
                self.rate
            )));
        }
        if self.workers == 0 {
            return Err(DispatchError::InvalidConfig(
                "workers must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }
}

/// Outcome of one injection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionStats {
    pub submitted: u64,
    pub send_failures: u64,
    pub runtime: Duration,
}

impl InjectionStats {
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.runtime.as_secs_f64();
        if secs > 0.0 {
            self.submitted as f64 / secs
        } else {
            0.0
        }
    }
}

struct SendJob {
    trace_id: String,
    target: NodeId,
    url: String,
    body: Bytes,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    peers: PeerDirectory,
    telemetry: TelemetrySink,
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        peers: PeerDirectory,
        telemetry: TelemetrySink,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .pool_max_idle_per_host(config.workers)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;

        Ok(Self {
            config,
            peers,
            telemetry,
            http,
        })
    }

    /// Replay every corpus entry once, in order, then wait for the send
    /// pool to finish its queue.
    pub async fn run(&self, corpus: &Corpus) -> Result<InjectionStats, DispatchError> {
        let (sender, receiver) = mpsc::unbounded_channel::<SendJob>();
        let failures = Arc::new(AtomicU64::new(0));

        // Start worker tasks with shared receiver
        let shared_receiver = Arc::new(Mutex::new(receiver));
        let workers: Vec<_> = (0..self.config.workers)
            .map(|worker_id| {
                let receiver = shared_receiver.clone();
                let http = self.http.clone();
                let failures = failures.clone();
                tokio::spawn(async move {
                    send_worker(worker_id, receiver, http, failures).await;
                })
            })
            .collect();

        let interval = self.config.interval();
        let started = Instant::now();
        let mut submitted = 0u64;

        info!(
            packets = corpus.len(),
            rate = self.config.rate,
            workers = self.config.workers,
            "Starting replay"
        );

        for entry in corpus.entries() {
            let tick = Instant::now();
            let packet = &entry.packet;
            let addr = self
                .peers
                .address(packet.entry_node.as_str(), packet.entry_node_kind);

            sender
                .send(SendJob {
                    trace_id: packet.trace_id.clone(),
                    target: packet.entry_node.clone(),
                    url: format!("http://{addr}/"),
                    body: entry.body.clone(),
                })
                .map_err(|_| DispatchError::PoolClosed)?;
            submitted += 1;

            self.telemetry.record(TelemetryEvent::new(
                packet.trace_id.as_str(),
                DISPATCHER_NODE_ID,
                TelemetryEventKind::Dispatch,
                packet.entry_node.as_str(),
            ));

            let elapsed = tick.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }

        // Closing the channel lets each worker exit once the queue is empty.
        drop(sender);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "send worker failed");
            }
        }

        let stats = InjectionStats {
            submitted,
            send_failures: failures.load(Ordering::Relaxed),
            runtime: started.elapsed(),
        };
        info!(
            submitted = stats.submitted,
            failures = stats.send_failures,
            runtime = ?stats.runtime,
            "Replay finished"
        );
        Ok(stats)
    }
}

async fn send_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<SendJob>>>,
    http: reqwest::Client,
    failures: Arc<AtomicU64>,
) {
    debug!("Send worker {} started", worker_id);

    loop {
        // Hold the lock only while waiting for the next job.
        let job = { receiver.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        let result = http
            .post(&job.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(job.body)
            .send()
            .await;

        let failure = match result {
            Ok(response) if response.status().is_success() => None,
            Ok(response) => Some(format!("entry node answered {}", response.status())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            failures.fetch_add(1, Ordering::Relaxed);
            warn!(tid = %job.trace_id, target = %job.target, error = %reason, "send failed");
        }
    }

    debug!("Send worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(DispatcherConfig::default().validate().is_ok());

        let zero_rate = DispatcherConfig {
            rate: 0.0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let no_workers = DispatcherConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn test_interval() {
        let config = DispatcherConfig {
            rate: 50.0,
            ..Default::default()
        };
        assert_eq!(config.interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_achieved_rate() {
        let stats = InjectionStats {
            submitted: 10,
            send_failures: 0,
            runtime: Duration::from_secs(2),
        };
        assert_eq!(stats.achieved_rate(), 5.0);
    }
}
