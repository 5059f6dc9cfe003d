//! Storage types

use serde::Serialize;

/// Normalized metadata about a stored object.
///
/// Built fresh from every get or list response. The ETag never carries the
/// double quotes the wire format wraps it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    bucket: String,
    key: String,
    etag: String,
    content_length: u64,
}

impl ObjectMetadata {
    /// Normalize a wire-level object description
    pub fn from_wire(
        bucket: impl Into<String>,
        key: impl Into<String>,
        etag: Option<&str>,
        size: Option<i64>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            etag: etag.map(unquote_etag).unwrap_or_default().to_string(),
            content_length: size.unwrap_or(0).max(0) as u64,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

/// Strip the surrounding double quotes from a wire ETag.
///
/// Tags that arrive unquoted pass through unchanged.
pub fn unquote_etag(etag: &str) -> &str {
    match etag.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner,
        None => etag,
    }
}
