//! Error types for the medcab_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medcab_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store snapshot could not be used
    #[error("Store error: {0}")]
    Store(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller may not perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Consuming a dose would drive the remaining quantity below zero
    #[error("No remaining units to consume for {0}")]
    NothingToConsume(String),

    /// No line of a manual order could be accepted
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
