//! Discovery of migration scripts on disk.
//!
//! A migration script is a file named `<sequence>_<description>.<ext>`, where
//! `sequence` is one or more ASCII digits. Files with a different extension,
//! hidden files and subdirectories are not migrations and are skipped.

use std::{collections::BTreeMap, fs, path::Path};

use tracing::debug;

use crate::{
  checksum::checksum,
  error::LoadError,
  script::{MigrationScript, MigrationSet},
};

/// Split a file stem into its numeric sequence and description.
///
/// Returns `None` unless the stem is `<digits>_<non-empty description>`.
pub fn parse_stem(stem: &str) -> Option<(u64, &str)> {
  let (sequence, description) = stem.split_once('_')?;
  if sequence.is_empty() || description.is_empty() {
    return None;
  }
  if !sequence.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  Some((sequence.parse().ok()?, description))
}

/// Read every migration script in `dir` with the given extension.
///
/// The returned set is sorted by sequence. Sequences compare numerically, so
/// `0002_a` and `00002_b` collide.
pub fn load(dir: &Path, extension: &str) -> Result<MigrationSet, LoadError> {
  let read_dir_err = |source| LoadError::ReadDir { path: dir.to_path_buf(), source };

  let mut by_sequence: BTreeMap<u64, MigrationScript> = BTreeMap::new();

  for dir_entry in fs::read_dir(dir).map_err(read_dir_err)? {
    let path = dir_entry.map_err(read_dir_err)?.path();

    if !path.is_file() {
      continue;
    }
    if path.extension().and_then(|e| e.to_str()) != Some(extension) {
      continue;
    }
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
      return Err(LoadError::MalformedName(path.to_string_lossy().into_owned()));
    };
    if file_name.starts_with('.') {
      continue;
    }

    let stem = &file_name[..file_name.len() - extension.len() - 1];
    let Some((sequence, _)) = parse_stem(stem) else {
      return Err(LoadError::MalformedName(file_name.to_owned()));
    };

    let content = fs::read_to_string(&path)
      .map_err(|source| LoadError::ReadScript { path: path.clone(), source })?;

    let script = MigrationScript {
      sequence,
      name: stem.to_owned(),
      checksum: checksum(content.as_bytes()),
      path,
      content,
    };

    if let Some(first) = by_sequence.get(&sequence) {
      return Err(LoadError::DuplicateSequence {
        sequence,
        first: first.name.clone(),
        second: script.name,
      });
    }
    by_sequence.insert(sequence, script);
  }

  debug!(dir = %dir.display(), count = by_sequence.len(), "loaded migration scripts");
  Ok(MigrationSet::from_sorted(by_sequence.into_values().collect()))
}
