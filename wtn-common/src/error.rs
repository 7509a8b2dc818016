//! Common error types for WTN

use thiserror::Error;

/// Common result type for WTN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the crawler, its store and its bootstrap code
#[derive(Error, Debug)]
pub enum Error {
    /// Store unavailable or a read/write failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML bootstrap file
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored row could not be mapped back to a domain value
    #[error("Corrupt stored value: {0}")]
    CorruptRow(String),

    /// Requested work item or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input (e.g. malformed subscriber address)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
