//! Read-only status report of scripts versus ledger.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ledger::LedgerEntry, script::MigrationSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
  Applied { at: DateTime<Utc> },
  Pending,
  /// Recorded under this name with a different checksum.
  Conflict { recorded: String },
  /// In the ledger but not on disk.
  Missing { at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
  pub name:     String,
  pub checksum: String,
  #[serde(flatten)]
  pub state:    MigrationState,
}

/// Classify every script and every ledger entry.
///
/// Scripts come first in sequence order, followed by ledger entries that have
/// no script, in ledger order.
pub fn status(set: &MigrationSet, ledger: &[LedgerEntry]) -> Vec<MigrationStatus> {
  let by_name: HashMap<&str, &LedgerEntry> = ledger.iter().map(|e| (e.name.as_str(), e)).collect();

  let mut report: Vec<MigrationStatus> = set
    .iter()
    .map(|script| {
      let state = match by_name.get(script.name.as_str()) {
        None => MigrationState::Pending,
        Some(e) if e.checksum == script.checksum => MigrationState::Applied { at: e.applied_at },
        Some(e) => MigrationState::Conflict { recorded: e.checksum.clone() },
      };
      MigrationStatus { name: script.name.clone(), checksum: script.checksum.clone(), state }
    })
    .collect();

  let on_disk: HashSet<&str> = set.iter().map(|s| s.name.as_str()).collect();
  report.extend(ledger.iter().filter(|e| !on_disk.contains(e.name.as_str())).map(|e| {
    MigrationStatus {
      name:     e.name.clone(),
      checksum: e.checksum.clone(),
      state:    MigrationState::Missing { at: e.applied_at },
    }
  }));

  report
}
