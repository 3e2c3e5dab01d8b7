//! Redirect outcome classification.
//!
//! Given a snapshot of the popup's address and the expected redirect path,
//! [`resolve`] decides whether the wait is over and how it ended. Both
//! detectors feed their observations through here.

use crate::error::PopupError;
use crate::location::LocationSnapshot;
use crate::params::{self, ParsedParams};

/// Result of inspecting one location.
#[derive(Debug)]
pub enum Decision {
    /// Not the redirect yet; keep waiting.
    Pending,
    /// Redirect carried parameters and no error.
    Resolved(ParsedParams),
    /// Redirect classified as a failure.
    Rejected(PopupError),
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Convert a terminal decision into the wait's result.
    pub fn into_outcome(self) -> Option<Result<ParsedParams, PopupError>> {
        match self {
            Self::Pending => None,
            Self::Resolved(params) => Some(Ok(params)),
            Self::Rejected(err) => Some(Err(err)),
        }
    }
}

/// Classify a location against the expected redirect path.
///
/// `expected_path` must already be normalized with
/// [`crate::location::normalize_path`]; comparison is exact.
pub fn resolve(snapshot: &LocationSnapshot, expected_path: &str) -> Decision {
    if snapshot.full_path != expected_path {
        return Decision::Pending;
    }

    match extract_params(&snapshot.query, &snapshot.fragment) {
        None => Decision::Rejected(PopupError::MissingRedirectParams),
        Some(Ok(params)) => Decision::Resolved(params),
        Some(Err(err)) => Decision::Rejected(err),
    }
}

/// Parse redirect parameters from a query and fragment.
///
/// Returns `None` when both components are empty. Otherwise returns the
/// merged parameters, or [`PopupError::ProviderError`] if they contain an
/// `error` key.
pub fn extract_params(query: &str, fragment: &str) -> Option<Result<ParsedParams, PopupError>> {
    if query.is_empty() && fragment.is_empty() {
        return None;
    }

    let params = params::merge(query, fragment);
    if let Some(message) = params.error() {
        return Some(Err(PopupError::ProviderError {
            message: message.to_string(),
        }));
    }

    Some(Ok(params))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
