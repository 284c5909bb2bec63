//! SQLite storage implementation

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use super::{Keys, Store, schema};
use crate::codec;
use crate::value::{StoredValue, ValueKind};
use crate::{Error, Result};

/// Database file created in the working directory by [`SqliteStore::new`]
pub const DEFAULT_DATABASE_FILE: &str = "wiremock-persistent-state.db";

/// How long a statement waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// SQLite-backed durable store.
///
/// One connection is opened at construction and reused for the store's
/// lifetime. If opening fails the store stays usable but degraded: every
/// operation fails soft.
pub struct SqliteStore {
    conn: Option<Mutex<Connection>>,
    location: String,
}

impl SqliteStore {
    /// Open `wiremock-persistent-state.db` in the working directory
    pub fn new() -> Self {
        Self::open(Path::new(DEFAULT_DATABASE_FILE))
    }

    /// Open a database file (creates if doesn't exist), degrading on failure
    pub fn open(path: &Path) -> Self {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`SqliteStore::open`] with an explicit busy timeout
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Self {
        match Self::try_open(path, busy_timeout) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(component = "DB", error = %e, "Could not open {}", path.display());
                Self {
                    conn: None,
                    location: path.display().to_string(),
                }
            }
        }
    }

    /// Open a database file, reporting connection and schema errors
    pub fn try_open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self::from_connection(conn, path.display().to_string())?;
        tracing::info!(
            component = "DB",
            "Connection to {} has been established.",
            store.location
        );
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, location: String) -> Result<Self> {
        let store = Self {
            conn: Some(Mutex::new(conn)),
            location,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            for stmt in schema::all_schema_statements() {
                conn.execute(stmt, [])?;
            }
            Ok(())
        })
    }

    /// Where this store points (path or `:memory:`)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Whether the connection was established
    pub fn is_available(&self) -> bool {
        self.conn.is_some()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| Error::Unavailable(format!("no connection to {}", self.location)))?;
        let guard = conn
            .lock()
            .map_err(|_| Error::Unavailable("connection lock poisoned".to_string()))?;
        f(&guard)
    }

    // ========== Fallible Operations ==========

    /// Look up and decode the value stored under `key`
    pub fn try_get(&self, key: &str) -> Result<Option<StoredValue>> {
        let object: Option<Option<String>> = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(schema::SELECT_STATE)?;
            Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
        })?;

        match object {
            None => Ok(None),
            Some(None) => Err(Error::Codec(format!("no object stored for key {}", key))),
            Some(Some(text)) => codec::decode(&text).map(Some),
        }
    }

    /// Encode `value` and upsert it under `key`
    pub fn try_put(&self, key: &str, value: &StoredValue) -> Result<()> {
        let encoded = codec::encode(value)?;
        tracing::debug!(component = "DB:put", key, bytes = encoded.len(), "Upserting state");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(schema::UPSERT_STATE)?;
            stmt.execute(params![key, encoded])?;
            Ok(())
        })
    }

    pub fn try_remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(schema::DELETE_STATE)?;
            stmt.execute([key])?;
            Ok(())
        })
    }

    pub fn try_clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(schema::DELETE_ALL_STATES, [])?;
            Ok(())
        })
    }

    /// Every stored key, fully read before returning
    pub fn try_all_keys(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(schema::SELECT_ALL_KEYS)?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.with_conn(|conn| {
            let (rows, payload_bytes): (i64, i64) =
                conn.query_row(schema::STATE_STATS, [], |row| Ok((row.get(0)?, row.get(1)?)))?;

            let mut by_kind = BTreeMap::new();
            let mut undecodable = 0;
            let mut stmt = conn.prepare("SELECT object FROM states")?;
            let objects = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
            for object in objects {
                match object?.as_deref().map(codec::decode) {
                    Some(Ok(value)) => *by_kind.entry(value.kind()).or_insert(0) += 1,
                    _ => undecodable += 1,
                }
            }

            Ok(StoreStats {
                rows: rows as usize,
                payload_bytes: payload_bytes as u64,
                by_kind,
                undecodable,
            })
        })
    }
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn log_failure(component: &'static str, err: &Error) {
    match err {
        Error::Codec(_) | Error::InvalidContextName => {
            tracing::warn!(component, error = %err, "Stored value could not be converted")
        }
        _ => tracing::warn!(component, error = %err, "State store operation failed"),
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.try_get(key).unwrap_or_else(|e| {
            log_failure("DB:get", &e);
            None
        })
    }

    fn put(&self, key: &str, value: StoredValue) {
        super::warn_on_key_mismatch("DB:put", key, &value);
        if let Err(e) = self.try_put(key, &value) {
            log_failure("DB:put", &e);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.try_remove(key) {
            log_failure("DB:remove", &e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            log_failure("DB:clear", &e);
        }
    }

    fn get_all_keys(&self) -> Keys {
        match self.try_all_keys() {
            Ok(keys) => Box::new(keys.into_iter()),
            Err(e) => {
                log_failure("DB:getAllKeys", &e);
                Box::new(std::iter::empty())
            }
        }
    }
}

/// Row counts and payload size of the states table
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub rows: usize,
    pub payload_bytes: u64,
    pub by_kind: BTreeMap<ValueKind, usize>,
    pub undecodable: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn sample_context(name: &str, status: &str) -> Context {
        let mut ctx = Context::new(name).unwrap();
        ctx.properties_mut().insert("status".into(), status.into());
        let mut entry = HashMap::new();
        entry.insert("event".to_string(), "created".to_string());
        ctx.list_mut().push(entry);
        ctx.record_request("req-1");
        ctx.inc_update_count();
        ctx
    }

    fn count_rows(path: &Path, key: &str) -> i64 {
        let conn = Connection::open(path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM states WHERE key = ?1", [key], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_put_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ctx = sample_context("a", "open");

        store.put("a", ctx.clone().into());

        assert_eq!(store.get_context("a"), Some(ctx));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_put_replaces_existing_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("a", sample_context("a", "open").into());

        let mut updated = sample_context("a", "closed");
        updated.inc_update_count();
        store.put("a", updated.clone().into());

        assert_eq!(store.get_context("a"), Some(updated));
        assert_eq!(store.try_all_keys().unwrap(), ["a"]);
    }

    #[test]
    fn test_scenario_put_get_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ctx = Context::new("a").unwrap();
        ctx.properties_mut().insert("status".into(), "open".into());
        ctx.inc_update_count();

        store.put("a", ctx.clone().into());
        let fetched = store.get_context("a").unwrap();
        assert_eq!(fetched.name(), "a");
        assert_eq!(fetched.properties()["status"], "open");
        assert_eq!(fetched.update_count(), 1);

        store.remove("a");
        assert!(store.get("a").is_none());
        assert_eq!(store.get_all_keys().count(), 0);
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.remove("never-written");
        assert!(store.try_remove("never-written").is_ok());
        assert!(store.get("never-written").is_none());
    }

    #[test]
    fn test_clear_and_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..20 {
            let key = format!("ctx-{}", i);
            store.put(&key, sample_context(&key, "open").into());
        }
        store.put("flag", StoredValue::Boolean(true));

        let mut keys: Vec<String> = store.get_all_keys().collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 21);

        store.clear();
        assert_eq!(store.get_all_keys().count(), 0);
        assert!(store.get("ctx-3").is_none());
    }

    #[test]
    fn test_corrupted_row_reads_as_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("a", sample_context("a", "open").into());
        store.put("b", sample_context("b", "open").into());

        store
            .with_conn(|conn| {
                conn.execute("UPDATE states SET object = 'AAAA####' WHERE key = 'a'", [])?;
                conn.execute("UPDATE states SET object = NULL WHERE key = 'b'", [])?;
                Ok(())
            })
            .unwrap();

        assert!(store.get("a").is_none());
        assert!(store.get("b").is_none());
        assert!(matches!(store.try_get("a"), Err(Error::Codec(_))));

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.undecodable, 2);
    }

    #[test]
    fn test_oversized_put_keeps_previous_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("k", StoredValue::Integer(1));

        let oversized = "x".repeat(codec::MAX_PAYLOAD_BYTES as usize + 1024 * 1024);
        assert!(matches!(
            store.try_put("k", &StoredValue::Text(oversized.clone())),
            Err(Error::Codec(_))
        ));
        store.put("k", StoredValue::Text(oversized));

        assert_eq!(store.get("k"), Some(StoredValue::Integer(1)));
        assert_eq!(store.try_all_keys().unwrap(), ["k"]);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let ctx = sample_context("order-7", "shipped");

        {
            let store = SqliteStore::open(&path);
            assert!(store.is_available());
            store.put("order-7", ctx.clone().into());
            store.put("visits", StoredValue::Integer(3));
        }

        let reopened = SqliteStore::open(&path);
        assert_eq!(reopened.get_context("order-7"), Some(ctx));
        assert_eq!(reopened.get("visits"), Some(StoredValue::Integer(3)));
    }

    #[test]
    fn test_degraded_store_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("state.db");

        let store = SqliteStore::open(&path);
        assert!(!store.is_available());

        store.put("a", sample_context("a", "open").into());
        assert!(store.get("a").is_none());
        store.remove("a");
        store.clear();
        assert_eq!(store.get_all_keys().count(), 0);
        assert!(matches!(store.try_get("a"), Err(Error::Unavailable(_))));
    }

    #[test]
    fn test_concurrent_upserts_leave_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = SqliteStore::open(&path);

        crossbeam::scope(|s| {
            for writer in 0..50 {
                let store = &store;
                s.spawn(move |_| {
                    let mut ctx = Context::new("order-42").unwrap();
                    ctx.properties_mut().insert("writer".into(), writer.to_string());
                    store.put("order-42", ctx.into());
                });
            }
        })
        .unwrap();

        assert_eq!(count_rows(&path, "order-42"), 1);
        let winner = store.get_context("order-42").unwrap();
        let writer: usize = winner.properties()["writer"].parse().unwrap();
        assert!(writer < 50);
    }

    #[test]
    fn test_concurrent_upserts_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let stores: Vec<SqliteStore> = (0..4).map(|_| SqliteStore::open(&path)).collect();

        crossbeam::scope(|s| {
            for (i, store) in stores.iter().enumerate() {
                s.spawn(move |_| {
                    for round in 0..10 {
                        store.put("order-42", StoredValue::Text(format!("{}-{}", i, round)));
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(count_rows(&path, "order-42"), 1);
        assert!(matches!(stores[0].get("order-42"), Some(StoredValue::Text(_))));
    }

    #[test]
    fn test_stats_by_kind() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("a", sample_context("a", "open").into());
        store.put("b", sample_context("b", "open").into());
        store.put("greeting", StoredValue::from("hi"));

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows, 3);
        assert!(stats.payload_bytes > 0);
        assert_eq!(stats.by_kind.get(&ValueKind::Context), Some(&2));
        assert_eq!(stats.by_kind.get(&ValueKind::Text), Some(&1));
        assert_eq!(stats.undecodable, 0);
    }

    fn arb_context() -> impl Strategy<Value = Context> {
        (
            "\\PC{1,24}",
            prop::collection::hash_map("\\PC{0,12}", "\\PC{0,24}", 0..8),
            prop::collection::vec(prop::collection::hash_map("\\PC{0,8}", "\\PC{0,16}", 0..4), 0..40),
            prop::collection::vec("\\PC{0,16}", 0..10),
            0u64..64,
        )
            .prop_map(|(name, properties, list, requests, updates)| {
                let mut ctx = Context::new(name).unwrap();
                ctx.properties_mut().extend(properties);
                ctx.list_mut().extend(list);
                for request in requests {
                    ctx.record_request(request);
                }
                for _ in 0..updates {
                    ctx.inc_update_count();
                }
                ctx
            })
    }

    proptest! {
        #[test]
        fn test_any_context_round_trips(ctx in arb_context()) {
            let store = SqliteStore::open_in_memory().unwrap();
            let key = ctx.name().to_string();
            store.put(&key, ctx.clone().into());
            prop_assert_eq!(store.get_context(&key), Some(ctx));

            store.remove(&key);
            prop_assert!(store.get(&key).is_none());
        }
    }
}
