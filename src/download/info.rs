//! Download state machine and progress snapshots.
//!
//! [`DownloadInfo`] is the value type the whole crate trades in: the owning
//! task mutates one instance behind a lock and publishes immutable clones;
//! readers only ever see those clones.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Suffix marking an in-progress partial file next to the final output path.
pub const PART_SUFFIX: &str = ".filepart";

/// Lifecycle states of a download.
///
/// Transitions: `Queued → Downloading → {Paused, Completed, Failed}` and
/// `Paused → Downloading` on resume. Cancellation is not a state; a cancelled
/// download simply disappears from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    /// Accepted by the registry, task not yet streaming.
    Queued,
    /// A worker is actively streaming bytes.
    Downloading,
    /// Stopped cooperatively; partial file retained for resume.
    Paused,
    /// Final file in place, no partial file remains.
    Completed,
    /// Transfer or IO error; partial file removed, `error` populated.
    Failed,
}

/// Point-in-time snapshot of one transfer's identity, state and metrics.
///
/// `version` increases by one on every published snapshot for a given id and
/// never resets while the id exists, so consumers can order and de-duplicate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    /// Opaque unique download id.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Resolved save name.
    pub filename: String,
    /// Directory the final file lands in.
    pub output_dir: PathBuf,
    /// Full final output path (`output_dir/filename`).
    pub file_path: PathBuf,
    /// In-progress partial file path (`file_path` + [`PART_SUFFIX`]).
    pub part_path: PathBuf,
    /// Current lifecycle state.
    pub status: DownloadStatus,
    /// Smoothed throughput in bytes per second.
    pub speed: u64,
    /// Percent complete, rounded to one decimal; 0 while total size unknown.
    pub progress: f64,
    /// Total size in bytes, 0 if not yet known.
    pub total_size: u64,
    /// Bytes written to the partial file so far.
    pub downloaded_size: u64,
    /// Estimated seconds remaining at the current speed.
    pub time_remaining: u64,
    /// Human-readable failure message; present only when status is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Monotonic per-id snapshot counter.
    pub version: u64,
}

/// Shared handle to the live state of one download.
///
/// The lock is held only for field updates and snapshot clones, never across
/// an await point.
pub(crate) type SharedInfo = Arc<Mutex<DownloadInfo>>;

/// Locks a shared download state, recovering a poisoned lock.
///
/// A writer can only poison the lock by panicking between plain field
/// assignments, which cannot leave the struct half-updated in a way readers
/// would misread.
pub(crate) fn lock_info(state: &SharedInfo) -> std::sync::MutexGuard<'_, DownloadInfo> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl DownloadInfo {
    /// Builds a fresh `Queued` entry at version 0.
    #[must_use]
    pub fn new(id: String, url: String, filename: String, output_dir: PathBuf) -> Self {
        let file_path = output_dir.join(&filename);
        let part_path = part_path_for(&file_path);
        Self {
            id,
            url,
            filename,
            output_dir,
            file_path,
            part_path,
            status: DownloadStatus::Queued,
            speed: 0,
            progress: 0.0,
            total_size: 0,
            downloaded_size: 0,
            time_remaining: 0,
            error: None,
            version: 0,
        }
    }

    /// Recomputes `progress` from the current byte counters.
    ///
    /// `progress = round(downloaded / total * 100, 1 decimal)` when the total
    /// is known, else 0.
    pub(crate) fn update_progress(&mut self) {
        if self.total_size == 0 {
            self.progress = 0.0;
        } else {
            #[allow(clippy::cast_precision_loss)]
            let percent = self.downloaded_size as f64 / self.total_size as f64 * 100.0;
            self.progress = (percent * 10.0).round() / 10.0;
        }
    }

    /// Marks the download failed: metrics zeroed, message recorded.
    pub(crate) fn set_failed(&mut self, message: String) {
        self.status = DownloadStatus::Failed;
        self.speed = 0;
        self.progress = 0.0;
        self.time_remaining = 0;
        self.error = Some(message);
    }

    /// True when no worker should be running for this entry.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Completed | DownloadStatus::Failed
        )
    }
}

/// Derives the partial-file path for a final output path.
#[must_use]
pub(crate) fn part_path_for(file_path: &Path) -> PathBuf {
    let mut os = file_path.as_os_str().to_os_string();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> DownloadInfo {
        DownloadInfo::new(
            "id-1".to_string(),
            "http://example.com/a.bin".to_string(),
            "a.bin".to_string(),
            PathBuf::from("/tmp/out"),
        )
    }

    #[test]
    fn test_new_info_is_queued_at_version_zero() {
        let info = sample();
        assert_eq!(info.status, DownloadStatus::Queued);
        assert_eq!(info.version, 0);
        assert_eq!(info.file_path, PathBuf::from("/tmp/out/a.bin"));
        assert_eq!(info.part_path, PathBuf::from("/tmp/out/a.bin.filepart"));
    }

    #[test]
    fn test_update_progress_rounds_to_one_decimal() {
        let mut info = sample();
        info.total_size = 3000;
        info.downloaded_size = 1000;
        info.update_progress();
        assert!((info.progress - 33.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_progress_zero_total_reports_zero() {
        let mut info = sample();
        info.downloaded_size = 500;
        info.update_progress();
        assert!((info.progress - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_progress_complete_is_one_hundred() {
        let mut info = sample();
        info.total_size = 1234;
        info.downloaded_size = 1234;
        info.update_progress();
        assert!((info.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_failed_zeroes_metrics_and_records_message() {
        let mut info = sample();
        info.speed = 9000;
        info.progress = 42.0;
        info.time_remaining = 12;
        info.set_failed("server returned HTTP 404".to_string());
        assert_eq!(info.status, DownloadStatus::Failed);
        assert_eq!(info.speed, 0);
        assert!((info.progress - 0.0).abs() < f64::EPSILON);
        assert_eq!(info.time_remaining, 0);
        assert!(info.error.as_deref().unwrap().contains("404"));
        assert!(info.is_terminal());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&DownloadStatus::Downloading).unwrap();
        assert_eq!(json, "\"DOWNLOADING\"");
    }

    #[test]
    fn test_error_field_omitted_when_absent() {
        let info = sample();
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"downloadedSize\""));
    }
}
