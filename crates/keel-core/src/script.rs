//! Migration scripts and the ordered set of them used for one run.

use std::path::PathBuf;

// ─── Script ──────────────────────────────────────────────────────────────────

/// A single migration script as read from disk.
///
/// Scripts are re-read on every run and never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
  /// Numeric ordering prefix parsed from the file name.
  pub sequence: u64,
  /// Full file stem, e.g. `00002_custom_user_fields`.
  pub name:     String,
  pub path:     PathBuf,
  pub content:  String,
  pub checksum: String,
}

// ─── Set ─────────────────────────────────────────────────────────────────────

/// Scripts for one run, sorted ascending by sequence with no duplicates.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
  scripts: Vec<MigrationScript>,
}

impl MigrationSet {
  /// Callers must supply scripts already sorted with unique sequences; the
  /// loader is the only producer.
  pub(crate) fn from_sorted(scripts: Vec<MigrationScript>) -> Self { Self { scripts } }

  pub fn iter(&self) -> std::slice::Iter<'_, MigrationScript> { self.scripts.iter() }

  pub fn len(&self) -> usize { self.scripts.len() }

  pub fn is_empty(&self) -> bool { self.scripts.is_empty() }

  pub fn get(&self, name: &str) -> Option<&MigrationScript> {
    self.scripts.iter().find(|s| s.name == name)
  }

  pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }
}

impl<'a> IntoIterator for &'a MigrationSet {
  type Item = &'a MigrationScript;
  type IntoIter = std::slice::Iter<'a, MigrationScript>;

  fn into_iter(self) -> Self::IntoIter { self.scripts.iter() }
}
