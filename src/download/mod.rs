//! Concurrent, resumable HTTP download engine.
//!
//! The [`DownloadRegistry`] tracks downloads and runs one worker per active
//! transfer. Each worker streams its resource to a `.filepart` file next to
//! the final path, resumes from the exact byte offset after a pause, and
//! publishes immutable [`DownloadInfo`] snapshots into the registry's
//! [`EventSink`] for any number of observers.
//!
//! # Example
//!
//! ```no_run
//! use downman::{Config, DownloadRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DownloadRegistry::new(Config::new("./downloads"));
//! let mut events = registry.subscribe();
//! let info = registry.add("https://example.com/big.iso", None, None).await?;
//! while let Some(snapshot) = events.recv().await {
//!     println!("{} {:?} {:.1}%", snapshot.id, snapshot.status, snapshot.progress);
//!     if snapshot.id == info.id && snapshot.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod filename;
mod info;
mod registry;
mod speed;
mod task;

pub use error::DownloadError;
pub use events::{EventSink, HEARTBEAT_PERIOD, Subscription, heartbeats};
pub use filename::FilenameResolver;
pub use info::{DownloadInfo, DownloadStatus, PART_SUFFIX};
pub use registry::DownloadRegistry;
