//! `rowkit` command-line runner.
//!
//! Runs updates, transactional batches, scripts and queries against a
//! `SQLite` file and prints results as JSON. The database is taken from
//! `--database` or `ROWKIT_DATABASE`; a `.env` file in the working
//! directory is loaded first.

mod params;

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use eyre::{Context, Result};
use rowkit::{DbConfig, Executor};
use serde::Serialize;

/// Run SQL against a `SQLite` database.
#[derive(Debug, Parser)]
#[command(name = "rowkit", version, about, long_about = None)]
struct Cli {
    /// Path of the database file.
    #[arg(long, env = "ROWKIT_DATABASE")]
    database: String,

    /// Open the database read-only.
    #[arg(long, env = "ROWKIT_READ_ONLY")]
    read_only: bool,

    /// Create the database file when it does not exist.
    #[arg(
        long,
        env = "ROWKIT_CREATE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    create: bool,

    /// How long to wait on a locked database.
    #[arg(long, env = "ROWKIT_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    busy_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a data-modifying statement and print the affected row count.
    Update {
        sql: String,
        /// Positional parameters: null, numbers, x'<hex>', @<file> or text.
        params: Vec<String>,
    },
    /// Execute a JSON batch file in one transaction and print the total.
    Batch { file: PathBuf },
    /// Print the first row of a query as JSON, or `null`.
    One { sql: String, params: Vec<String> },
    /// Print every row of a query as a JSON array, or `null`.
    List { sql: String, params: Vec<String> },
    /// Run a parameterless script of `;`-separated statements.
    Script { sql: String },
}

impl Cli {
    fn config(&self) -> DbConfig {
        let mut config = DbConfig::new(&self.database);
        config.read_only = self.read_only;
        config.create = self.create;
        config.busy_timeout_ms = self.busy_timeout_ms;
        config
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).wrap_err("could not encode output")?;
    println!("{json}");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let executor = Executor::from_config(cli.config());
    match cli.command {
        Command::Update { sql, params } => {
            let params = params::parse_params(&params)?;
            let affected = executor.execute_update(&sql, &params)?;
            println!("{affected}");
        }
        Command::Batch { file } => {
            let json = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("could not read {}", file.display()))?;
            let batch = params::parse_batch(&json)?;
            tracing::debug!(statements = batch.sqls.len(), "running batch");
            let total = executor.execute_batch(&batch.sqls, &batch.param_lists)?;
            println!("{total}");
        }
        Command::One { sql, params } => {
            let params = params::parse_params(&params)?;
            print_json(&executor.query_one(&sql, &params)?)?;
        }
        Command::List { sql, params } => {
            let params = params::parse_params(&params)?;
            print_json(&executor.query_list(&sql, &params)?)?;
        }
        Command::Script { sql } => executor.execute_script(&sql)?,
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    run(Cli::parse())
}
