//! Error types for wtn-crawler
//!
//! Severity is decided by the caller, not the error:
//! - [`FetchError`] is absorbed per listing and recorded on the run report
//! - [`DataShapeError`] skips one record
//! - [`TransportError`] is counted per recipient and never escalated
//! - [`RunError`] marks the whole run failed

use thiserror::Error;

/// Upstream catalog request failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure, ...
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the per-request timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the catalog API
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Body was not the listing JSON we expect
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Network, timeout and 5xx failures are worth retrying; 4xx and parse
    /// failures will not change on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Upstream { status, .. } => *status >= 500,
            FetchError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// A listing element missing a required field or carrying the wrong type
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Malformed record from {origin}: {reason}")]
pub struct DataShapeError {
    /// Listing the element came from (e.g. "category:mon", "candidate:page 3")
    pub origin: String,
    pub reason: String,
}

/// Notification send failure for one recipient
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail relay rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Failure that aborts a reconciliation run
#[derive(Debug, Error)]
pub enum RunError {
    /// Store unreadable or batch write failed; nothing was committed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] wtn_common::Error),
}
