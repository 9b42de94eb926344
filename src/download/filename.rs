//! Save-name resolution for downloads.
//!
//! Precedence: caller override, then a `Content-Disposition` probe against
//! the origin, then the last URL path segment, then a generated fallback.
//! All candidates pass through [`sanitize_filename`] before use.

use reqwest::header::CONTENT_DISPOSITION;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Resolves the on-disk filename for a URL.
///
/// Pure string handling except for the metadata probe; holds no state beyond
/// the HTTP client it probes with.
#[derive(Debug, Clone)]
pub struct FilenameResolver {
    client: reqwest::Client,
}

impl FilenameResolver {
    /// Creates a resolver probing with the given client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Produces a sanitized save name for `url`.
    ///
    /// Never fails: when neither the override, the origin's headers nor the
    /// URL path yield a usable name, a generated `file-<uuid>.html` is used.
    pub async fn resolve(&self, url: &str, override_name: Option<&str>) -> String {
        if let Some(name) = override_name.map(sanitize_filename).filter(|n| !n.is_empty()) {
            return name;
        }
        if let Some(name) = self
            .probe_content_disposition(url)
            .await
            .map(|n| sanitize_filename(&n))
            .filter(|n| !n.is_empty())
        {
            return name;
        }
        if let Some(name) = filename_from_url(url)
            .map(|n| sanitize_filename(&n))
            .filter(|n| !n.is_empty())
        {
            return name;
        }
        format!("file-{}.html", Uuid::new_v4())
    }

    /// Issues a metadata probe and parses any Content-Disposition header.
    async fn probe_content_disposition(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(url, %error, "filename probe failed");
                return None;
            }
        };

        for value in response.headers().get_all(CONTENT_DISPOSITION) {
            if let Ok(header) = value.to_str()
                && let Some(name) = parse_content_disposition(header)
            {
                debug!(url, filename = %name, "filename from Content-Disposition");
                return Some(name);
            }
        }
        None
    }
}

/// Extracts a filename from a `Content-Disposition` header value.
///
/// The RFC 5987 extended form is preferred over the plain one:
/// - `filename*=UTF-8''%E4%BE%8B%E5%AD%90.txt`
/// - `filename="example.txt"` / `filename=example.txt`
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    parse_encoded_filename(header).or_else(|| parse_quoted_filename(header))
}

fn parse_encoded_filename(header: &str) -> Option<String> {
    let start = find_param(header, "filename*=")?;
    let value = header[start..].trim();
    // charset'language'percent-encoded-name
    let (_charset, rest) = value.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    let end = encoded.find(';').unwrap_or(encoded.len());
    let encoded = encoded[..end].trim();
    urlencoding::decode(encoded)
        .ok()
        .map(std::borrow::Cow::into_owned)
        .filter(|name| !name.is_empty())
}

fn parse_quoted_filename(header: &str) -> Option<String> {
    let start = find_param(header, "filename=")?;
    let value = header[start..].trim();
    let name = if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        &stripped[..end]
    } else {
        let end = value.find(';').unwrap_or(value.len());
        value[..end].trim()
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// Case-insensitive parameter search returning the value start offset.
fn find_param(header: &str, param: &str) -> Option<usize> {
    header
        .to_ascii_lowercase()
        .find(param)
        .map(|pos| pos + param.len())
}

/// Last path segment of the URL, percent-decoded.
pub(crate) fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| last.to_string());
    Some(decoded)
}

/// Makes a candidate name safe for common filesystems.
///
/// Replaces `/ \ : * ? " < > |`, NUL and other control characters with `_`,
/// rewrites a leading dot, and trims surrounding whitespace.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let undotted = match replaced.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None => replaced,
    };
    undotted.trim().to_string()
}
