//! Per-transfer download engine.
//!
//! One [`DownloadTask`] owns one run of one transfer: it sizes the partial
//! file, issues a (possibly ranged) GET, streams the body to disk in buffered
//! appends, keeps the shared [`DownloadInfo`] current, and publishes
//! throttled snapshots. Pause is a cooperative flag observed at chunk
//! boundaries; cancel aborts the task at its next await point, after which
//! the registry runs the idempotent partial-file cleanup.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::RANGE;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info, warn};

use super::error::DownloadError;
use super::events::EventSink;
use super::info::{DownloadStatus, SharedInfo, lock_info};
use super::speed::{SpeedEstimator, time_remaining_secs};
use crate::user_agent;

/// Write buffer in front of the partial file (512 KiB).
const WRITE_BUFFER_SIZE: usize = 512 * 1024;

/// Minimum interval between two published progress snapshots of one task.
///
/// Decouples event volume from chunk arrival rate; state keeps updating every
/// chunk, observers see at most one snapshot per interval.
pub(crate) const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(400);

/// A single streaming run of one download.
pub(crate) struct DownloadTask {
    state: SharedInfo,
    client: reqwest::Client,
    sink: EventSink,
    paused: Arc<AtomicBool>,
}

/// Registry-held control half of a spawned task.
///
/// The `Paused` transition is state the task side writes and publishes, like
/// every other mutation of one download's `DownloadInfo`; the registry only
/// detaches the worker handle.
pub(crate) struct TaskController {
    state: SharedInfo,
    sink: EventSink,
    paused: Arc<AtomicBool>,
}

impl TaskController {
    /// Signals the worker to stop after the current chunk and publishes the
    /// `Paused` snapshot. The last measured speed is kept as-is.
    pub(crate) fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        let snapshot = {
            let mut state = lock_info(&self.state);
            state.status = DownloadStatus::Paused;
            state.version += 1;
            state.clone()
        };
        self.sink.publish(snapshot);
    }
}

impl DownloadTask {
    pub(crate) fn new(state: SharedInfo, client: reqwest::Client, sink: EventSink) -> Self {
        Self {
            state,
            client,
            sink,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Control handle for the registry, valid across the task's whole life.
    pub(crate) fn controller(&self) -> TaskController {
        TaskController {
            state: Arc::clone(&self.state),
            sink: self.sink.clone(),
            paused: Arc::clone(&self.paused),
        }
    }

    /// Runs the transfer to a terminal state, pause, or abort.
    ///
    /// Any [`DownloadError`] is absorbed here: the state transitions to
    /// `Failed` with a human-readable message and the partial file is
    /// removed. Errors never escape to the spawning registry.
    pub(crate) async fn run(self) {
        let (url, filename, part_path) = {
            let mut state = lock_info(&self.state);
            if self.paused.load(Ordering::SeqCst) {
                // Paused before the first byte; the controller already
                // published the transition.
                return;
            }
            state.status = DownloadStatus::Downloading;
            (
                state.url.clone(),
                state.filename.clone(),
                state.part_path.clone(),
            )
        };
        info!(filename = %filename, "download started");

        match self.transfer(&url, &part_path).await {
            Ok(TransferOutcome::Completed) => {
                info!(filename = %filename, "download completed");
            }
            Ok(TransferOutcome::PausedEarly) => {
                info!(filename = %filename, "download paused");
            }
            Err(transfer_error) => {
                warn!(filename = %filename, error = %transfer_error, "download failed");
                let snapshot = {
                    let mut state = lock_info(&self.state);
                    state.set_failed(transfer_error.to_string());
                    state.version += 1;
                    state.clone()
                };
                self.sink.publish(snapshot);
                remove_part_file(&part_path).await;
            }
        }
    }

    /// Streams the body into the partial file and finalizes on completion.
    async fn transfer(
        &self,
        url: &str,
        part_path: &Path,
    ) -> Result<TransferOutcome, DownloadError> {
        let existing_bytes = partial_size(part_path).await;
        {
            let mut state = lock_info(&self.state);
            state.downloaded_size = existing_bytes;
        }

        let response = self.send_ranged_get(url, existing_bytes).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        let content_length = response
            .content_length()
            .filter(|length| *length > 0)
            .ok_or_else(|| DownloadError::empty_body(url))?;

        // Size is known now; publish immediately so observers see the total.
        let file_path = {
            let mut state = lock_info(&self.state);
            state.total_size = existing_bytes + content_length;
            state.update_progress();
            state.version += 1;
            self.sink.publish(state.clone());
            state.file_path.clone()
        };

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(part_path)
            .await
            .map_err(|e| DownloadError::io(part_path, e))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut stream = response.bytes_stream();

        let mut estimator = SpeedEstimator::new(existing_bytes, Instant::now());
        let mut last_publish = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

            if self.paused.load(Ordering::SeqCst) {
                writer
                    .flush()
                    .await
                    .map_err(|e| DownloadError::io(part_path, e))?;
                return Ok(TransferOutcome::PausedEarly);
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(part_path, e))?;

            let now = Instant::now();
            {
                let mut state = lock_info(&self.state);
                state.downloaded_size += chunk.len() as u64;
                state.update_progress();
                if let Some(speed) = estimator.tick(state.downloaded_size, now) {
                    state.speed = speed;
                    if let Some(eta) =
                        time_remaining_secs(state.total_size, state.downloaded_size, speed)
                    {
                        state.time_remaining = eta;
                    }
                }
            }

            if now.duration_since(last_publish) >= PROGRESS_UPDATE_INTERVAL {
                let snapshot = {
                    let mut state = lock_info(&self.state);
                    state.version += 1;
                    state.clone()
                };
                self.sink.publish(snapshot);
                last_publish = now;
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(part_path, e))?;
        tokio::fs::rename(part_path, &file_path)
            .await
            .map_err(|e| DownloadError::io(file_path.clone(), e))?;

        let snapshot = {
            let mut state = lock_info(&self.state);
            state.status = DownloadStatus::Completed;
            state.update_progress();
            state.version += 1;
            state.clone()
        };
        self.sink.publish(snapshot);
        Ok(TransferOutcome::Completed)
    }

    /// GET with the identifying User-Agent and, when resuming, a range header.
    async fn send_ranged_get(
        &self,
        url: &str,
        existing_bytes: u64,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent::default_user_agent());
        if existing_bytes > 0 {
            request = request.header(RANGE, format!("bytes={existing_bytes}-"));
        }
        request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }
}

/// How a non-failed run ended.
enum TransferOutcome {
    Completed,
    PausedEarly,
}

/// Size of the partial file, 0 when absent.
async fn partial_size(part_path: &Path) -> u64 {
    tokio::fs::metadata(part_path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// Deletes the partial file if present. Safe to call any number of times,
/// including after natural completion (the rename already consumed it).
pub(crate) async fn remove_part_file(part_path: &Path) {
    match tokio::fs::remove_file(part_path).await {
        Ok(()) => info!(path = %part_path.display(), "deleted partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(path = %part_path.display(), error = %e, "failed to delete partial file"),
    }
}
