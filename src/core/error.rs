//! Error types for the cover system
//!
//! Only configuration and runtime setup report errors this way. Generation,
//! index and evaluation operations signal failure through their return values.

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
