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

//! Background Telemetry Sink
//!
//! Appends [`TelemetryEvent`]s to `{log_dir}/{node_id}_log.csv` from a
//! dedicated task so that recording never blocks the request path.
//!
//! ## Architecture
//!
//! ```text
//! NodeRouter / Dispatcher ──try_send──► bounded channel ──► sink_worker
//!                                                               │
//!                                         one append-mode file per node id
//! ```
//!
//! When the channel is full the event is dropped and counted; telemetry is
//! for offline analysis and must not add backpressure to the replay.

use meshreplay_core::TelemetryEvent;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Directory holding the per-node CSV streams
    pub log_dir: PathBuf,
    /// Events buffered before new ones are dropped
    pub channel_capacity: usize,
}

impl SinkConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            channel_capacity: 8192,
        }
    }
}

enum SinkMessage {
    Record(TelemetryEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub recorded: u64,
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct SinkStatsInternal {
    recorded: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Handle to the sink task. Cheap to clone; the task exits once every
/// handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct TelemetrySink {
    sender: mpsc::Sender<SinkMessage>,
    stats: Arc<SinkStatsInternal>,
}

impl TelemetrySink {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(config: SinkConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let stats = Arc::new(SinkStatsInternal::default());

        let worker_stats = stats.clone();
        tokio::spawn(async move {
            sink_worker(receiver, config.log_dir, worker_stats).await;
        });

        Self { sender, stats }
    }

    /// Queue an event without waiting.
    pub fn record(&self, event: TelemetryEvent) {
        match self.sender.try_send(SinkMessage::Record(event)) {
            Ok(()) => {
                self.stats.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(SinkMessage::Record(dropped))) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(tid = %dropped.trace_id, "telemetry buffer full, dropping event");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!("telemetry sink closed, cannot record event");
            }
        }
    }

    /// Resolves once every event queued before this call is on disk.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(SinkMessage::Flush(tx)).await.is_err() {
            return;
        }
        let _ = rx.await;
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            recorded: self.stats.recorded.load(Ordering::Relaxed),
            written: self.stats.written.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Path of the stream for `node_id` under `log_dir`.
    pub fn stream_path(log_dir: &Path, node_id: &str) -> PathBuf {
        log_dir.join(format!("{node_id}_log.csv"))
    }
}

async fn sink_worker(
    mut receiver: mpsc::Receiver<SinkMessage>,
    log_dir: PathBuf,
    stats: Arc<SinkStatsInternal>,
) {
    let mut files: HashMap<String, File> = HashMap::new();

    while let Some(message) = receiver.recv().await {
        match message {
            SinkMessage::Record(event) => {
                match append(&mut files, &log_dir, &event).await {
                    Ok(()) => {
                        stats.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        // reopen on next write
                        files.remove(&event.node_id);
                        warn!(node = %event.node_id, error = %e, "failed to write telemetry row");
                    }
                }
            }
            SinkMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("telemetry sink shutting down");
}

async fn append(
    files: &mut HashMap<String, File>,
    log_dir: &Path,
    event: &TelemetryEvent,
) -> std::io::Result<()> {
    if !files.contains_key(&event.node_id) {
        tokio::fs::create_dir_all(log_dir).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(TelemetrySink::stream_path(log_dir, &event.node_id))
            .await?;
        files.insert(event.node_id.clone(), file);
    }

    if let Some(file) = files.get_mut(&event.node_id) {
        file.write_all(event.to_csv_row().as_bytes()).await?;
        // tokio::fs::File completes writes in the background until flushed
        file.flush().await?;
    }
    Ok(())
}
