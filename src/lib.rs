//! downman core library
//!
//! Manages concurrent, resumable HTTP file transfers: submit a URL, stream it
//! to disk with live speed/ETA/percent progress, pause and resume from the
//! exact byte offset, cancel mid-flight without leaving partial output.
//!
//! # Architecture
//!
//! - [`download`] - registry, per-transfer task engine, progress event fabric
//! - [`config`] - explicitly constructed runtime settings
//! - [`netinfo`] - passthrough public network-information lookup

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod netinfo;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use config::Config;
pub use download::{
    DownloadError, DownloadInfo, DownloadRegistry, DownloadStatus, EventSink, FilenameResolver,
    HEARTBEAT_PERIOD, PART_SUFFIX, Subscription, heartbeats,
};
pub use netinfo::{NetInfoError, NetworkInfo};
