//! GitHub API error type.
//!
//! PR synchronization is all-or-nothing: a missing PR number would corrupt
//! the cross-links in every sibling's navigation block, so any API failure
//! aborts the whole run. Errors carry the HTTP status code when it can be
//! recovered and the full underlying error for display.

use std::fmt;

use thiserror::Error;

/// A GitHub API failure. Always fatal to the current synchronization.
#[derive(Debug, Error)]
pub struct ApiError {
    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl ApiError {
    /// Creates an error without an octocrab source.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an octocrab error, extracting the status code when possible.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = extract_status_code(&err);
        Self {
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Extracts the HTTP status code from an octocrab error, if present.
///
/// octocrab does not expose a stable status-code accessor across all of its
/// error variants, so this falls back to matching well-established message
/// patterns. Returning `None` is always safe; the code is informational.
fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
    let err_str = err.to_string();

    if let Some(idx) = err_str.find("status: ") {
        let rest = &err_str[idx + 8..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    for code in [401u16, 403, 404, 409, 422, 429, 500, 502, 503] {
        if err_str.contains(&code.to_string()) {
            return Some(code);
        }
    }

    None
}
