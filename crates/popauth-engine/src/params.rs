//! Redirect parameter parsing.
//!
//! Providers return authorization results in the redirect's query string,
//! its fragment, or both. This module parses each component into a flat
//! key/value map and merges them into [`ParsedParams`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Value recorded for a key that appears without `=`.
const BARE_KEY_VALUE: &str = "true";

// ---------------------------------------------------------------------------
// ParsedParams
// ---------------------------------------------------------------------------

/// Flat mapping of redirect parameter names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedParams(BTreeMap<String, String>);

impl ParsedParams {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a single parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The provider's `error` parameter, if present.
    pub fn error(&self) -> Option<&str> {
        self.get("error")
    }

    /// Insert a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copy every entry of `other` into `self`; `other` wins on collisions.
    pub fn merge_from(&mut self, other: ParsedParams) {
        self.0.extend(other.0);
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters were captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Unwrap into the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K, V> FromIterator<(K, V)> for ParsedParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an `a=b&c=d` style string into a flat map.
///
/// Keys and values are percent-decoded (`+` decodes to a space). A key with
/// no `=` maps to `"true"`. Empty segments are skipped, so an empty input
/// yields an empty map. For repeated keys the last value wins.
pub fn parse_query_string(raw: &str) -> ParsedParams {
    let mut params = ParsedParams::new();

    for segment in raw.split('&').filter(|s| !s.is_empty()) {
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        if segment.contains('=') {
            params.insert(key, value);
        } else {
            params.insert(key, BARE_KEY_VALUE);
        }
    }

    params
}

/// Trim a raw query or fragment component down to its parameter text.
///
/// Drops a leading `?` or `#` and a single trailing `/`, which some
/// routers append to the component.
pub fn strip_component(raw: &str) -> &str {
    let raw = raw
        .strip_prefix('?')
        .or_else(|| raw.strip_prefix('#'))
        .unwrap_or(raw);
    raw.strip_suffix('/').unwrap_or(raw)
}

/// Parse and merge query and fragment components.
///
/// The query is parsed first and the fragment second, so a key present in
/// both resolves to the fragment's value.
pub fn merge(query: &str, fragment: &str) -> ParsedParams {
    let mut params = parse_query_string(strip_component(query));
    params.merge_from(parse_query_string(strip_component(fragment)));
    params
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
