//! # wiremock-state - Persistent context store
//!
//! State layer for a mock-server state extension: named, mutable contexts
//! kept across requests.
//!
//! wiremock-state provides:
//! - `Context`, the versioned record a stateful mock resource carries
//! - A fail-soft `Store` contract over string keys
//! - An in-memory backend on a bounded concurrent cache
//! - A durable backend on a single SQLite file
//! - A versioned, checksummed codec for persisted values

pub mod context;
pub mod value;
pub mod codec;
pub mod store;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use context::Context;
pub use value::{StoredValue, ValueKind};
pub use store::{open_store, Keys, MemoryStore, SqliteStore, Store};
pub use config::{BackendKind, CacheConfig, StateConfig};

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
///
/// These never cross the `Store` boundary; the backends log them and fall
/// back to a safe default.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Context name must not be empty")]
    InvalidContextName,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Codec(err.to_string())
    }
}
