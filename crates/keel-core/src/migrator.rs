//! [`Migrator`]: where migrations live and how a run treats them.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::{
  Error, LedgerStore, Result, applier,
  error::LoadError,
  loader,
  recovery::{self, LegacyRename},
  script::MigrationSet,
};

/// Configuration for migration runs against a directory of scripts.
#[derive(Debug, Clone)]
pub struct Migrator {
  dir:            PathBuf,
  extension:      String,
  legacy_renames: Vec<LegacyRename>,
}

impl Migrator {
  /// Migrations in `dir` with the `sql` extension and the known legacy
  /// renames.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir:            dir.into(),
      extension:      "sql".to_owned(),
      legacy_renames: LegacyRename::known(),
    }
  }

  pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
    self.extension = extension.into();
    self
  }

  pub fn with_legacy_renames(mut self, renames: Vec<LegacyRename>) -> Self {
    self.legacy_renames = renames;
    self
  }

  pub fn dir(&self) -> &Path { &self.dir }

  pub fn extension(&self) -> &str { &self.extension }

  pub fn legacy_renames(&self) -> &[LegacyRename] { &self.legacy_renames }

  /// Read the current scripts from disk.
  pub fn load(&self) -> Result<MigrationSet, LoadError> { loader::load(&self.dir, &self.extension) }

  /// Load and apply without legacy recovery.
  pub async fn apply<S: LedgerStore>(&self, store: &S) -> Result<usize> {
    let set = self.load()?;
    applier::apply(&set, store).await
  }

  /// Load and apply, recovering from known legacy renames.
  pub async fn run<S: LedgerStore>(&self, store: &S) -> Result<usize> {
    recovery::recover_legacy_rename_and_apply(self, store).await
  }
}

/// Run `migrator` against `store`, then close the store whatever the outcome.
///
/// A failed run takes precedence over a failed close.
pub async fn migrate<S: LedgerStore>(store: S, migrator: &Migrator) -> Result<usize> {
  debug!(dir = %migrator.dir().display(), "applying migrations");

  let outcome = migrator.run(&store).await;
  let closed = store.close().await;

  match (outcome, closed) {
    (Ok(count), Ok(())) => {
      debug!(applied = count, "finished applying migrations");
      Ok(count)
    }
    (Ok(_), Err(e)) => Err(Error::store(e)),
    (Err(e), closed) => {
      if let Err(close) = closed {
        error!(error = %close, "failed to close ledger store after failed run");
      }
      Err(e)
    }
  }
}
