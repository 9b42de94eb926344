//! Error types for the download module.
//!
//! Structured errors with enough context to render the human-readable message
//! a failed download carries in its snapshot.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving or transferring a download.
///
/// A pause or cancel is never represented here: an externally requested stop
/// unwinds the task without an error and without a `Failed` transition.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS, connection refused, TLS, mid-stream reset).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status code.
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Server answered success but reported no or non-positive content length.
    #[error("no content returned from server for {url}")]
    EmptyBody {
        /// The URL that returned an empty body.
        url: String,
    },

    /// File system error (create, append, flush, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

// We intentionally do NOT implement `From<reqwest::Error>` or
// `From<std::io::Error>`: the variants require context (url, path) the source
// errors don't carry. The helper constructors are the seam instead.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_contains_code_and_url() {
        let error = DownloadError::http_status("http://example.com/f.bin", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "expected status in: {msg}");
        assert!(msg.contains("http://example.com/f.bin"));
    }

    #[test]
    fn test_empty_body_display() {
        let error = DownloadError::empty_body("http://example.com/f.bin");
        assert!(error.to_string().contains("no content"));
    }

    #[test]
    fn test_io_display_contains_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DownloadError::io(PathBuf::from("/tmp/x.filepart"), source);
        assert!(error.to_string().contains("/tmp/x.filepart"));
    }

    #[test]
    fn test_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"));
        assert!(msg.contains("not-a-url"));
    }
}
