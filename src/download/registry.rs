//! Coordination of all known downloads.
//!
//! The registry owns the id → entry map and the lifecycle operations on it.
//! Each entry pairs the shared live state with the handle of its running
//! worker, if any. Per-id atomicity comes from the map's entry locks; there
//! is no registry-wide lock and operations on different ids never contend.
//!
//! The registry only orchestrates: progress state is written by the owning
//! task alone, and every observable change is published as a snapshot by
//! whoever performs it (the task for transfer progress, the pause path for
//! the pause transition).

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use super::error::DownloadError;
use super::events::{EventSink, Subscription};
use super::filename::FilenameResolver;
use super::info::{DownloadInfo, DownloadStatus, SharedInfo, lock_info};
use super::task::{DownloadTask, TaskController, remove_part_file};
use crate::config::Config;
use crate::user_agent;

/// A currently running worker for one download.
struct RunningTask {
    /// Task-side pause control; the transition itself happens there.
    controller: TaskController,
    /// Handle for forceful cancellation.
    handle: JoinHandle<()>,
}

/// One known download: its live state plus worker bookkeeping.
struct DownloadEntry {
    state: SharedInfo,
    /// The active worker; `None` while queued-for-resume, paused or terminal.
    running: Option<RunningTask>,
    /// A pause-signalled worker still draining. A resumed worker is chained
    /// behind this handle so two workers never stream the same id at once.
    stopping: Option<JoinHandle<()>>,
}

/// Tracks all downloads and their running tasks.
///
/// Explicitly constructed; independent instances (and their event feeds) do
/// not share any state, so tests can run registries side by side.
pub struct DownloadRegistry {
    config: Config,
    client: reqwest::Client,
    resolver: FilenameResolver,
    sink: EventSink,
    entries: DashMap<String, DownloadEntry>,
}

impl DownloadRegistry {
    /// Creates a registry with its own HTTP client and event sink.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(std::time::Duration::from_secs(config.read_timeout_secs))
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        let sink = EventSink::new(config.event_capacity);
        Self {
            config,
            resolver: FilenameResolver::new(client.clone()),
            client,
            sink,
            entries: DashMap::new(),
        }
    }

    /// The shared progress-event feed of this registry.
    #[must_use]
    pub fn events(&self) -> &EventSink {
        &self.sink
    }

    /// Opens a live feed of progress snapshots from this moment on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.sink.subscribe()
    }

    /// Registers a new download and starts streaming it.
    ///
    /// The filename comes from the override, the origin's headers, or the
    /// URL; the output directory defaults to the configured download dir.
    /// Returns the freshly created `Queued` snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for an unparseable URL and
    /// [`DownloadError::Io`] when the output directory cannot be created.
    /// Transfer failures are not surfaced here; they arrive as `Failed`
    /// snapshots on the event feed.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn add(
        &self,
        url: &str,
        filename_override: Option<&str>,
        output_dir: Option<&Path>,
    ) -> Result<DownloadInfo, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let filename = self.resolver.resolve(url, filename_override).await;
        let output_dir = output_dir
            .unwrap_or(&self.config.download_dir)
            .to_path_buf();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| DownloadError::io(output_dir.clone(), e))?;

        let id = Uuid::new_v4().to_string();
        let info = DownloadInfo::new(id.clone(), url.to_string(), filename, output_dir);
        let snapshot = info.clone();
        let state: SharedInfo = Arc::new(Mutex::new(info));

        let running = self.spawn_task(&state, None);
        self.entries.insert(
            id.clone(),
            DownloadEntry {
                state,
                running: Some(running),
                stopping: None,
            },
        );
        info!(id, filename = %snapshot.filename, "download added");
        Ok(snapshot)
    }

    /// Point-in-time snapshots of all known downloads.
    ///
    /// Always clones under each entry's state lock; never hands out the live
    /// state a worker is mutating.
    #[must_use]
    pub fn list(&self) -> Vec<DownloadInfo> {
        self.entries
            .iter()
            .map(|entry| lock_info(&entry.value().state).clone())
            .collect()
    }

    /// Snapshot of one download, if known.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<DownloadInfo> {
        self.entries
            .get(id)
            .map(|entry| lock_info(&entry.value().state).clone())
    }

    /// Signals the running task to stop after the current chunk.
    ///
    /// No-op when the id is unknown or has no running worker. The `Paused`
    /// transition is written and published by the task's controller; the
    /// registry only detaches the handle. The partial file stays on disk and
    /// the entry stays listed as `Paused`.
    pub fn pause(&self, id: &str) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            debug!(id, "pause ignored: unknown id");
            return;
        };
        if lock_info(&entry.state).is_terminal() {
            debug!(id, "pause ignored: already finished");
            return;
        }
        let Some(task) = entry.running.take() else {
            debug!(id, "pause ignored: no running task");
            return;
        };

        task.controller.pause();
        entry.stopping = Some(task.handle);
        info!(id, "paused download task");
    }

    /// Restarts a paused download from its partial-file offset.
    ///
    /// No-op unless the current status is `Paused`. The fresh worker is
    /// chained behind any still-draining predecessor, so at most one worker
    /// ever streams a given id.
    pub fn resume(&self, id: &str) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            debug!(id, "resume ignored: unknown id");
            return;
        };
        if lock_info(&entry.state).status != DownloadStatus::Paused || entry.running.is_some() {
            debug!(id, "resume ignored: not paused");
            return;
        }

        info!(id, "resuming download task");
        let predecessor = entry.stopping.take();
        let state = Arc::clone(&entry.state);
        entry.running = Some(self.spawn_task(&state, predecessor));
    }

    /// Forcefully terminates and forgets a download.
    ///
    /// No-op when the id is unknown. The entry leaves the registry before
    /// the worker is aborted, so a racing `resume` finds nothing to restart.
    /// Cleanup runs after the task has unwound and is idempotent: cancelling
    /// a download that just completed naturally removes only the listing.
    pub async fn cancel(&self, id: &str) {
        let Some((_, entry)) = self.entries.remove(id) else {
            debug!(id, "cancel ignored: unknown id");
            return;
        };
        info!(id, "cancelling download task");

        if let Some(task) = entry.running {
            task.handle.abort();
            let _ = task.handle.await;
        }
        if let Some(stopping) = entry.stopping {
            stopping.abort();
            let _ = stopping.await;
        }

        let part_path = lock_info(&entry.state).part_path.clone();
        remove_part_file(&part_path).await;
    }

    /// Spawns a worker for `state`, optionally chained behind a predecessor
    /// that is still draining after a pause signal.
    fn spawn_task(&self, state: &SharedInfo, predecessor: Option<JoinHandle<()>>) -> RunningTask {
        let task = DownloadTask::new(Arc::clone(state), self.client.clone(), self.sink.clone());
        let controller = task.controller();
        let handle = tokio::spawn(async move {
            if let Some(previous) = predecessor {
                let _ = previous.await;
            }
            task.run().await;
        });
        RunningTask { controller, handle }
    }
}

impl std::fmt::Debug for DownloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRegistry")
            .field("downloads", &self.entries.len())
            .field("subscribers", &self.sink.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn registry_in(dir: &TempDir) -> DownloadRegistry {
        DownloadRegistry::new(Config::new(dir.path()))
    }

    /// Polls the registry until one entry reaches `status`.
    async fn wait_for_status(registry: &DownloadRegistry, id: &str, status: DownloadStatus) {
        for _ in 0..200 {
            if registry.get(id).is_some_and(|info| info.status == status) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
        panic!("download {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_url() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let result = registry.add("not-a-valid-url", None, None).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_add_returns_queued_snapshot_with_version_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let info = registry
            .add(&format!("{}/f.bin", server.uri()), None, None)
            .await
            .unwrap();
        assert_eq!(info.status, DownloadStatus::Queued);
        assert_eq!(info.version, 0);
        assert_eq!(info.filename, "f.bin");
        assert_eq!(info.output_dir, dir.path());
    }

    #[tokio::test]
    async fn test_pause_and_resume_unknown_id_are_noops() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.pause("no-such-id");
        registry.resume("no-such-id");
        registry.cancel("no-such-id").await;
    }

    #[tokio::test]
    async fn test_resume_requires_paused_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        let info = registry
            .add(&format!("{}/f.bin", server.uri()), None, None)
            .await
            .unwrap();

        // Wait for completion, then resume must be a no-op.
        wait_for_status(&registry, &info.id, DownloadStatus::Completed).await;
        registry.resume(&info.id);
        assert_eq!(
            registry.get(&info.id).unwrap().status,
            DownloadStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_list_returns_copies_not_live_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        let info = registry
            .add(&format!("{}/f.bin", server.uri()), None, None)
            .await
            .unwrap();

        let mut listed = registry.list();
        assert_eq!(listed.len(), 1);
        // Mutating the returned copy must not affect the registry.
        listed[0].downloaded_size = 999_999;
        assert_ne!(registry.get(&info.id).unwrap().downloaded_size, 999_999);
    }
}
