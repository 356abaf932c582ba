//! The migration applier: verifies the ledger against the scripts on disk and
//! applies whatever is pending, one transaction per script.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  ledger::{ApplyFailure, LedgerEntry, LedgerStore},
  script::{MigrationScript, MigrationSet},
};

/// Check a ledger snapshot against `set` and return the pending scripts in
/// sequence order.
///
/// Fails on the first ledger entry whose script is missing or whose checksum
/// differs from the file on disk. Nothing is executed before this check
/// passes for the whole ledger.
pub fn pending<'a>(set: &'a MigrationSet, ledger: &[LedgerEntry]) -> Result<Vec<&'a MigrationScript>> {
  let mut applied: HashMap<&str, &LedgerEntry> = HashMap::with_capacity(ledger.len());

  for entry in ledger {
    let Some(script) = set.get(&entry.name) else {
      return Err(Error::MigrationMissing { name: entry.name.clone() });
    };
    if script.checksum != entry.checksum {
      return Err(Error::LedgerConflict {
        name:     entry.name.clone(),
        expected: entry.checksum.clone(),
        actual:   script.checksum.clone(),
      });
    }
    applied.insert(entry.name.as_str(), entry);
  }

  let latest_applied = set
    .iter()
    .filter(|s| applied.contains_key(s.name.as_str()))
    .map(|s| s.sequence)
    .max();

  let pending: Vec<_> = set.iter().filter(|s| !applied.contains_key(s.name.as_str())).collect();

  if let Some(latest) = latest_applied {
    for script in pending.iter().filter(|s| s.sequence < latest) {
      warn!(
        migration = %script.name,
        latest_applied = latest,
        "pending migration sorts before an already applied one; applying out of order"
      );
    }
  }

  Ok(pending)
}

/// Apply every pending script in `set` against `store`.
///
/// The ledger is read once up front. Scripts run strictly in sequence order;
/// the first failure aborts the run, leaving earlier scripts committed.
/// Returns how many scripts were newly applied.
pub async fn apply<S: LedgerStore>(set: &MigrationSet, store: &S) -> Result<usize> {
  let ledger = store.list().await.map_err(Error::store)?;
  let pending = pending(set, &ledger)?;

  debug!(total = set.len(), applied = ledger.len(), pending = pending.len(), "verified ledger");

  let mut count = 0;
  for script in pending {
    debug!(migration = %script.name, "applying migration");
    match store.apply_script(script).await {
      Ok(entry) => {
        info!(migration = %entry.name, checksum = %entry.checksum, "applied migration");
        count += 1;
      }
      Err(ApplyFailure::Execution(e)) => {
        return Err(Error::Execution { name: script.name.clone(), source: Box::new(e) });
      }
      Err(ApplyFailure::LedgerWrite(e)) => {
        return Err(Error::LedgerWrite { name: script.name.clone(), source: Box::new(e) });
      }
    }
  }

  Ok(count)
}
