//! Popup location snapshots and path normalization.

use url::Url;

use crate::error::Result;

/// Canonical `scheme://host:port/path` form of a URL, for equality checks.
///
/// The port is always present: an implicit port is replaced by the scheme's
/// well-known default. Query and fragment are not part of the result.
pub fn normalize_path(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let path = url.path();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    match url.port_or_known_default() {
        Some(port) => format!("{}://{host}:{port}{path}", url.scheme()),
        None => format!("{}://{host}{path}", url.scheme()),
    }
}

/// A single read of the popup's current address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSnapshot {
    /// The full address as read.
    pub href: String,
    /// Output of [`normalize_path`] for this address.
    pub full_path: String,
    /// Raw query, without the leading `?`. Empty if absent.
    pub query: String,
    /// Raw fragment, without the leading `#`. Empty if absent.
    pub fragment: String,
}

impl LocationSnapshot {
    pub fn from_url(url: &Url) -> Self {
        Self {
            href: url.to_string(),
            full_path: normalize_path(url),
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
        }
    }

    /// Parse an absolute URL string into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PopupError::UrlParse`] if `href` is not a valid URL.
    pub fn parse(href: &str) -> Result<Self> {
        let url = Url::parse(href)?;
        Ok(Self::from_url(&url))
    }

    /// Whether the query or the fragment carries any content.
    pub fn has_params(&self) -> bool {
        !self.query.is_empty() || !self.fragment.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
