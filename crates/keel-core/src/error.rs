//! Error types for `keel-core`.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a directory into a [`MigrationSet`](crate::MigrationSet).
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("cannot read migrations directory {path:?}: {source}")]
  ReadDir {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot read migration script {path:?}: {source}")]
  ReadScript {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed migration file name {0:?}; expected <sequence>_<description>.<ext>")]
  MalformedName(String),

  #[error("duplicate migration sequence {sequence}: {first:?} and {second:?}")]
  DuplicateSequence {
    sequence: u64,
    first:    String,
    second:   String,
  },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Load(#[from] LoadError),

  /// The script on disk no longer hashes to what the ledger recorded.
  #[error(
    "ledger conflict for migration {name:?}: ledger recorded checksum {expected}, file hashes to {actual}"
  )]
  LedgerConflict {
    name:     String,
    expected: String,
    actual:   String,
  },

  #[error("ledger references migration {name:?} but no such script exists")]
  MigrationMissing { name: String },

  #[error("migration {name:?} failed to execute: {source}")]
  Execution {
    name:   String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The script ran but its ledger entry could not be written.
  #[error("migration {name:?} could not be recorded in the ledger: {source}")]
  LedgerWrite {
    name:   String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("ledger store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cannot rename {from:?} to {to:?}: {source}")]
  Rename {
    from:   PathBuf,
    to:     PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  /// Whether this is a ledger conflict or missing-script error for the
  /// migration called `name`.
  pub fn concerns(&self, name: &str) -> bool {
    match self {
      Self::LedgerConflict { name: n, .. } | Self::MigrationMissing { name: n } => n == name,
      _ => false,
    }
  }

  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
