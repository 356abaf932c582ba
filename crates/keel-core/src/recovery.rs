//! Recovery from the legacy `00002` file name drift.
//!
//! An earlier release recorded `00002_custom-user-fields` in the ledger while
//! the script now ships as `00002_custom_user_fields`. A plain run therefore
//! fails with a missing-script error naming the legacy migration. Recovery
//! renames the file to the name the ledger expects, applies again, and then
//! renames it back no matter how the second attempt ends, since the
//! migrations directory may be a volume shared with other processes.

use std::{
  fs,
  io,
  path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::{Error, LedgerStore, Result, applier::apply, migrator::Migrator};

/// A known historical rename: the ledger may hold `legacy` for the script now
/// named `canonical`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRename {
  pub legacy:    String,
  pub canonical: String,
}

impl LegacyRename {
  pub fn new(legacy: impl Into<String>, canonical: impl Into<String>) -> Self {
    Self { legacy: legacy.into(), canonical: canonical.into() }
  }

  /// Renames shipped releases are known to have left in ledgers.
  pub fn known() -> Vec<Self> {
    vec![Self::new("00002_custom-user-fields", "00002_custom_user_fields")]
  }
}

// ─── Rename guard ────────────────────────────────────────────────────────────

/// A script file temporarily moved to another name.
///
/// Dropping the guard moves it back; [`RenameGuard::restore`] does the same
/// but reports failure.
#[derive(Debug)]
pub(crate) struct RenameGuard {
  original: PathBuf,
  renamed:  PathBuf,
  armed:    bool,
}

impl RenameGuard {
  /// Move `original` to `renamed`. Refuses to replace an existing file.
  pub(crate) fn acquire(original: &Path, renamed: PathBuf) -> Result<Self> {
    if renamed.exists() {
      return Err(Error::Rename {
        from:   original.to_path_buf(),
        to:     renamed,
        source: io::Error::new(io::ErrorKind::AlreadyExists, "target file already exists"),
      });
    }
    fs::rename(original, &renamed).map_err(|source| Error::Rename {
      from: original.to_path_buf(),
      to: renamed.clone(),
      source,
    })?;
    Ok(Self { original: original.to_path_buf(), renamed, armed: true })
  }

  pub(crate) fn restore(mut self) -> Result<()> {
    self.armed = false;
    fs::rename(&self.renamed, &self.original).map_err(|source| Error::Rename {
      from: self.renamed.clone(),
      to: self.original.clone(),
      source,
    })
  }
}

impl Drop for RenameGuard {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    if let Err(e) = fs::rename(&self.renamed, &self.original) {
      warn!(
        from = %self.renamed.display(),
        to = %self.original.display(),
        error = %e,
        "failed to restore migration file name"
      );
    }
  }
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// Apply pending migrations, recovering from a known legacy rename if the
/// first attempt trips over one.
///
/// Errors that do not name a known legacy migration are returned unchanged
/// and nothing is renamed. Once recovery starts, the error of the second
/// attempt is the one returned.
pub async fn recover_legacy_rename_and_apply<S: LedgerStore>(
  migrator: &Migrator,
  store: &S,
) -> Result<usize> {
  let set = migrator.load()?;

  let first = match apply(&set, store).await {
    Ok(count) => return Ok(count),
    Err(e) => e,
  };

  let Some(rename) = migrator.legacy_renames().iter().find(|r| first.concerns(&r.legacy)) else {
    return Err(first);
  };
  let Some(script) = set.get(&rename.canonical) else {
    return Err(first);
  };

  info!(
    legacy = %rename.legacy,
    canonical = %rename.canonical,
    "correcting legacy migration name"
  );

  let legacy_path = script.path.with_file_name(format!("{}.{}", rename.legacy, migrator.extension()));
  let guard = RenameGuard::acquire(&script.path, legacy_path)?;

  let second = match migrator.load() {
    Ok(set) => apply(&set, store).await,
    Err(e) => Err(e.into()),
  };

  match (second, guard.restore()) {
    (Ok(count), Ok(())) => Ok(count),
    (Ok(_), Err(restore)) => Err(restore),
    (Err(e), restored) => {
      if let Err(restore) = restored {
        error!(error = %restore, "failed to restore migration file name after failed retry");
      }
      Err(e)
    }
  }
}
