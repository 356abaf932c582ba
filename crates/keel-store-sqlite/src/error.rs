//! Error type for `keel-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("migration error: {0}")]
  Core(#[from] keel_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The ledger table name is interpolated into SQL, so only plain
  /// identifiers are accepted.
  #[error("invalid ledger table name {0:?}")]
  InvalidTableName(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
