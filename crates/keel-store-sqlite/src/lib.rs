//! SQLite backend for the Keel migration ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Migration scripts run on the same
//! connection as the ledger, so each script and its ledger row share one
//! transaction.

mod encode;
mod store;

pub mod error;

use std::path::Path;

use keel_core::Migrator;

pub use error::{Error, Result};
pub use store::{LedgerOptions, SqliteLedger};

/// Apply all pending migrations in `migrator`'s directory to the SQLite
/// database at `database`.
///
/// Opens a ledger connection for the whole run and closes it on every exit
/// path. Returns the number of newly applied scripts.
pub async fn apply_migrations(
  database: impl AsRef<Path>,
  migrator: &Migrator,
  options:  LedgerOptions,
) -> Result<usize> {
  let ledger = SqliteLedger::open(database, options).await?;
  Ok(keel_core::migrate(ledger, migrator).await?)
}

#[cfg(test)]
mod tests;
