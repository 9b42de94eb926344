//! Runtime configuration for the download manager.
//!
//! One explicitly constructed [`Config`] per registry instance. There is no
//! process-wide state; tests build independent configs pointing at temp dirs.

use std::path::PathBuf;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-read HTTP timeout (30 seconds between bytes on the stream).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default capacity of each subscriber's event buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Settings shared by a [`DownloadRegistry`](crate::DownloadRegistry) and the
/// tasks it spawns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory downloads are written to when `add` gets no explicit one.
    pub download_dir: PathBuf,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Per-subscriber progress-event buffer capacity.
    pub event_capacity: usize,
}

impl Config {
    /// Creates a config with the given default download directory.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for Config {
    /// Defaults to a `downloads` directory under the current working directory.
    fn default() -> Self {
        Self::new(PathBuf::from("downloads"))
    }
}
