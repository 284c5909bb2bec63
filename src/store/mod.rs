//! Storage Layer - pluggable, fail-soft context persistence
//!
//! Two interchangeable backends implement [`Store`]:
//! - [`MemoryStore`]: bounded in-process cache, fast, volatile
//! - [`SqliteStore`]: single SQLite file with table
//!   `states(key TEXT PRIMARY KEY, object TEXT)`, survives restarts
//!
//! One backend is picked at startup by [`open_store`]; the two are never
//! mixed within a running instance.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use crate::config::{BackendKind, StateConfig};
use crate::context::Context;
use crate::value::StoredValue;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreStats, DEFAULT_DATABASE_FILE};

/// Key enumeration produced by [`Store::get_all_keys`]
pub type Keys = Box<dyn Iterator<Item = String> + Send>;

/// Key-value contract shared by every backend.
///
/// Every operation always "succeeds" at this boundary. Backend failures
/// (I/O, locked file, corrupt rows) are logged and degrade to a safe default:
/// `get` returns `None`, `put`/`remove`/`clear` do nothing, `get_all_keys`
/// yields nothing. A caller that needs confirmation of a write must `get`
/// the key back.
pub trait Store: Send + Sync {
    /// Current value for `key`, or `None` if absent
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Insert or replace the value for `key`
    fn put(&self, key: &str, value: StoredValue);

    /// Delete `key`; absent keys are a no-op
    fn remove(&self, key: &str);

    /// Delete every key
    fn clear(&self);

    /// Every stored key, once each, in unspecified order
    fn get_all_keys(&self) -> Keys;

    /// The context stored under `key`; other value kinds read as absent
    fn get_context(&self, key: &str) -> Option<Context> {
        self.get(key).and_then(StoredValue::into_context)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store a context under its own name
    fn put_context(&self, ctx: Context) {
        let key = ctx.name().to_string();
        self.put(&key, StoredValue::Context(ctx));
    }
}

/// Log a context whose name differs from the key it is stored under.
///
/// The write still goes through; keys are the caller's to choose.
pub(crate) fn warn_on_key_mismatch(component: &'static str, key: &str, value: &StoredValue) {
    if let Some(ctx) = value.as_context() {
        if ctx.name() != key {
            tracing::warn!(
                component,
                key,
                context = ctx.name(),
                "Context stored under a different key"
            );
        }
    }
}

/// Build the backend named by the configuration
pub fn open_store(config: &StateConfig) -> Arc<dyn Store> {
    match config.backend {
        BackendKind::Memory => {
            tracing::info!(component = "Store", "Using in-memory backend");
            Arc::new(MemoryStore::with_config(&config.cache))
        }
        BackendKind::Sqlite => {
            let path = config.database_path();
            tracing::info!(component = "Store", "Using SQLite backend at {}", path.display());
            Arc::new(SqliteStore::open_with_timeout(&path, config.busy_timeout()))
        }
    }
}
