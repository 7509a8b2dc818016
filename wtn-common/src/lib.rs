//! # WTN Common Library
//!
//! Shared code for the webtoon completion notifier:
//! - Common error and result types
//! - Bootstrap configuration (TOML) and data folder resolution
//! - SQLite initialization and schema migrations

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
