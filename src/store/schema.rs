//! Database schema and statements

/// SQL to create the states table
pub const CREATE_STATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS states (
    key TEXT PRIMARY KEY,
    object TEXT
)
"#;

/// Single-statement upsert; a concurrent writer never sees the row missing
pub const UPSERT_STATE: &str = r#"
INSERT INTO states (key, object) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET object = excluded.object
"#;

pub const SELECT_STATE: &str = "SELECT object FROM states WHERE key = ?1";

pub const SELECT_ALL_KEYS: &str = "SELECT key FROM states";

pub const DELETE_STATE: &str = "DELETE FROM states WHERE key = ?1";

/// Portable full delete (no TRUNCATE in SQLite)
pub const DELETE_ALL_STATES: &str = "DELETE FROM states";

pub const STATE_STATS: &str =
    "SELECT COUNT(*), COALESCE(SUM(LENGTH(object)), 0) FROM states";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_STATES_TABLE]
}
