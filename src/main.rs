//! wiremock-state CLI - inspect and maintain the persisted context store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "wiremock-state")]
#[command(version)]
#[command(about = "Inspect and maintain the persistent state of a mock server")]
#[command(long_about = r#"
wiremock-state works on the durable context store the mock server writes
(wiremock-persistent-state.db by default):
  • List stored keys
  • Decode and print a stored context
  • Remove single keys or clear the store
  • Report size and value kinds

Example usage:
  wiremock-state init
  wiremock-state keys
  wiremock-state show order-42 --json
  wiremock-state clear --yes
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to wiremock-state.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,

        /// Backend to configure (sqlite or memory)
        #[arg(short, long, default_value = "sqlite")]
        backend: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List every stored key
    Keys {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Decode and print the value stored under a key
    Show {
        /// Store key
        key: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Print the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a single key
    Remove {
        /// Store key
        key: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Delete every stored key
    Clear {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Confirm deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Show statistics about the stored state
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = wiremock_state::config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { force, backend, database } => {
            let path = cli
                .config
                .unwrap_or_else(wiremock_state::config::default_config_path);
            commands::run_init(&path, &backend, database, force)
        }
        Commands::Keys { database } => commands::run_keys(&config, database),
        Commands::Show { key, database, json } => commands::run_show(&config, database, &key, json),
        Commands::Remove { key, database } => commands::run_remove(&config, database, &key),
        Commands::Clear { database, yes } => commands::run_clear(&config, database, yes),
        Commands::Stats { database } => commands::run_stats(&config, database),
    }
}
