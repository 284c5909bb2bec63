use std::path::{Path, PathBuf};

use wiremock_state::config::{ensure_db_dir, write_config};
use wiremock_state::ui::{self, Icons};
use wiremock_state::{BackendKind, Context, SqliteStore, StateConfig, StoredValue};

/// Open the durable store named on the command line or in the config.
///
/// Unlike the server path this surfaces connection errors instead of
/// degrading, so the operator sees why a command did nothing.
fn open_durable(config: &StateConfig, database: Option<PathBuf>) -> anyhow::Result<SqliteStore> {
    if config.backend == BackendKind::Memory && database.is_none() {
        ui::warn("Config selects the in-memory backend; inspecting the durable file instead.");
    }
    let path = database.unwrap_or_else(|| config.database_path());
    if !path.exists() {
        anyhow::bail!("no state database at {}", path.display());
    }
    Ok(SqliteStore::try_open(&path, config.busy_timeout())?)
}

pub fn run_init(path: &Path, backend: &str, database: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let backend: BackendKind = backend.parse()?;
    let config = StateConfig {
        backend,
        database: database.map(|p| p.to_string_lossy().to_string()),
        ..StateConfig::default()
    };
    if backend == BackendKind::Sqlite {
        ensure_db_dir(&config.database_path())?;
    }
    write_config(path, &config, force)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}

pub fn run_keys(config: &StateConfig, database: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_durable(config, database)?;
    let mut keys = store.try_all_keys()?;
    keys.sort();

    ui::header(&format!("Keys in {}", store.location()));
    if keys.is_empty() {
        println!("{} No keys stored.", Icons::EMPTY);
        return Ok(());
    }
    for key in &keys {
        ui::key_row(key);
    }
    println!();
    ui::summary_row("Total:", &keys.len().to_string());
    Ok(())
}

pub fn run_show(config: &StateConfig, database: Option<PathBuf>, key: &str, json: bool) -> anyhow::Result<()> {
    let store = open_durable(config, database)?;
    let Some(value) = store.try_get(key)? else {
        anyhow::bail!("no value stored under '{}'", key);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match value {
        StoredValue::Context(ctx) => print_context(&ctx),
        other => {
            ui::header(key);
            ui::info("Kind", other.kind().as_str());
            ui::info("Value", &scalar_text(&other));
        }
    }
    Ok(())
}

fn scalar_text(value: &StoredValue) -> String {
    match value {
        StoredValue::Text(s) => s.clone(),
        StoredValue::Integer(n) => n.to_string(),
        StoredValue::Float(n) => n.to_string(),
        StoredValue::Boolean(b) => b.to_string(),
        StoredValue::Context(ctx) => ctx.to_string(),
    }
}

fn print_context(ctx: &Context) {
    ui::header(ctx.name());
    ui::info("Update count", &ctx.update_count().to_string());

    ui::section("Properties");
    let mut properties: Vec<_> = ctx.properties().iter().collect();
    properties.sort();
    if properties.is_empty() {
        println!("  {}", ui::muted("(none)"));
    }
    for (name, value) in properties {
        ui::summary_row(&format!("{}:", name), value);
    }

    ui::section("List");
    if ctx.list().is_empty() {
        println!("  {}", ui::muted("(empty)"));
    }
    for (i, entry) in ctx.list().iter().enumerate() {
        let mut fields: Vec<_> = entry.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        fields.sort();
        println!("  {} {}", ui::dim(&format!("[{}]", i)), fields.join(", "));
    }

    ui::section("Requests");
    if ctx.request_log().is_empty() {
        println!("  {}", ui::muted("(none)"));
    }
    for request in ctx.request_log() {
        println!("  {}", request);
    }
}

pub fn run_remove(config: &StateConfig, database: Option<PathBuf>, key: &str) -> anyhow::Result<()> {
    let store = open_durable(config, database)?;
    if !store.try_all_keys()?.iter().any(|k| k == key) {
        ui::warn(&format!("No key '{}' stored; nothing to remove.", key));
        return Ok(());
    }
    store.try_remove(key)?;
    println!("{} Removed '{}'", Icons::DEL, key);
    Ok(())
}

pub fn run_clear(config: &StateConfig, database: Option<PathBuf>, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to clear the store without --yes");
    }
    let store = open_durable(config, database)?;
    let count = store.try_all_keys()?.len();
    store.try_clear()?;
    ui::success(&format!("Cleared {} key(s) from {}", count, store.location()));
    Ok(())
}

pub fn run_stats(config: &StateConfig, database: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_durable(config, database)?;
    let stats = store.stats()?;

    println!("{} State statistics ({})", Icons::STATS, store.location());
    let mut rows: Vec<(&str, String)> = vec![
        ("Keys", stats.rows.to_string()),
        ("Payload bytes", stats.payload_bytes.to_string()),
    ];
    for (kind, count) in &stats.by_kind {
        rows.push((kind.as_str(), count.to_string()));
    }
    rows.push(("Undecodable", stats.undecodable.to_string()));
    println!("{}", ui::stats_table(&rows));

    if stats.undecodable > 0 {
        ui::warn("Some rows could not be decoded; the server reads them as absent.");
    }
    Ok(())
}
