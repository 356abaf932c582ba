//! Layered runtime settings: an optional TOML file overridden by `KEEL_*`
//! environment variables.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  time::Duration,
};

use keel_core::Migrator;
use keel_store_sqlite::LedgerOptions;
use serde::Deserialize;

use crate::providers::ProviderSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub database_path:   PathBuf,
  pub migrations_dir:  PathBuf,
  pub extension:       String,
  pub ledger_table:    String,
  pub busy_timeout_ms: u64,
  pub providers:       BTreeMap<String, ProviderSettings>,
}

impl Default for Settings {
  fn default() -> Self {
    let ledger = LedgerOptions::default();
    Self {
      database_path:   PathBuf::from("keel.db"),
      migrations_dir:  PathBuf::from("migrations"),
      extension:       "sql".to_owned(),
      ledger_table:    ledger.table,
      busy_timeout_ms: ledger.busy_timeout.as_millis() as u64,
      providers:       BTreeMap::new(),
    }
  }
}

impl Settings {
  /// Read `path` (if it exists), then apply `KEEL_*` overrides, e.g.
  /// `KEEL_DATABASE_PATH` or `KEEL_PROVIDERS__GITHUB__ENABLED`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("KEEL")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn database_path(&self) -> PathBuf { expand_tilde(&self.database_path) }

  pub fn migrator(&self) -> Migrator {
    Migrator::new(expand_tilde(&self.migrations_dir)).with_extension(self.extension.clone())
  }

  pub fn ledger_options(&self) -> LedgerOptions {
    LedgerOptions {
      table:        self.ledger_table.clone(),
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
