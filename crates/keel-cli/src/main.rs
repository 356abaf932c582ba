//! `keel` applies pending schema migrations at service startup.
//!
//! Reads `keel.toml` (or the path given with `--config`) layered under
//! `KEEL_*` environment variables, validates the configured sign-in
//! providers, and applies every pending migration to the SQLite database.
//!
//! ```text
//! keel                 # same as `keel migrate`
//! keel status --json
//! keel providers
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use keel_cli::{Settings, enabled_providers};
use keel_core::{LedgerStore, MigrationState};
use keel_store_sqlite::SqliteLedger;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Keel schema migration runner")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "keel.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Apply all pending migrations.
  Migrate,
  /// Show applied, pending, conflicting and missing migrations.
  Status {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
  },
  /// List the enabled sign-in providers.
  Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)
    .with_context(|| format!("failed to read configuration from {:?}", cli.config))?;

  match cli.command.unwrap_or(Command::Migrate) {
    Command::Migrate => migrate(&settings).await,
    Command::Status { json } => status(&settings, json).await,
    Command::Providers => list_providers(&settings),
  }
}

async fn migrate(settings: &Settings) -> anyhow::Result<()> {
  let providers = enabled_providers(&settings.providers).context("invalid provider configuration")?;
  let names: Vec<_> = providers.iter().map(|p| p.kind.as_str()).collect();
  tracing::info!(providers = ?names, "sign-in providers enabled");

  let database = settings.database_path();
  let migrator = settings.migrator();

  let applied = keel_store_sqlite::apply_migrations(&database, &migrator, settings.ledger_options())
    .await
    .with_context(|| {
      format!("failed to apply migrations from {:?} to {database:?}", migrator.dir())
    })?;

  tracing::info!(applied, "migrations up to date");
  Ok(())
}

async fn status(settings: &Settings, json: bool) -> anyhow::Result<()> {
  let database = settings.database_path();
  let set = settings.migrator().load().context("failed to load migrations")?;

  let ledger = SqliteLedger::open(&database, settings.ledger_options())
    .await
    .with_context(|| format!("failed to open ledger in {database:?}"))?;
  let entries = ledger.list().await;
  ledger.close().await.context("failed to close ledger")?;
  let entries = entries.context("failed to read ledger")?;

  let report = keel_core::status(&set, &entries);

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  for line in &report {
    let state = match &line.state {
      MigrationState::Applied { at } => format!("applied   {}", at.to_rfc3339()),
      MigrationState::Pending => "pending".to_owned(),
      MigrationState::Conflict { recorded } => format!("CONFLICT  ledger checksum {recorded}"),
      MigrationState::Missing { at } => format!("MISSING   applied {}", at.to_rfc3339()),
    };
    println!("{:<40} {state}", line.name);
  }
  Ok(())
}

fn list_providers(settings: &Settings) -> anyhow::Result<()> {
  let providers = enabled_providers(&settings.providers).context("invalid provider configuration")?;
  if providers.is_empty() {
    println!("no sign-in providers enabled");
  }
  for provider in providers {
    println!("{:<12} scope: {}", provider.kind.as_str(), provider.scope.join(" "));
  }
  Ok(())
}
