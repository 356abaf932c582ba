//! The `LedgerStore` trait and the ledger entry type.
//!
//! The trait is implemented by database backends (e.g. `keel-store-sqlite`).
//! The applier and recovery workflows depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::script::MigrationScript;

/// One applied migration. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub name:       String,
  pub checksum:   String,
  pub applied_at: DateTime<Utc>,
}

/// Why [`LedgerStore::apply_script`] failed.
///
/// Either way the transaction was rolled back, so the script left no ledger
/// entry behind.
#[derive(Debug)]
pub enum ApplyFailure<E> {
  /// The database rejected the script's statements.
  Execution(E),
  /// The statements ran but the ledger row could not be inserted or the
  /// transaction could not be committed.
  LedgerWrite(E),
}

/// Abstraction over the persisted migration ledger of one database.
///
/// A store value is the connection for a whole run; at most one run may hold a
/// store for a given database at a time.
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read every ledger entry, oldest first.
  fn list(&self) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  /// Execute `script` and record its ledger entry inside a single
  /// transaction. Returns the entry that was written.
  fn apply_script<'a>(
    &'a self,
    script: &'a MigrationScript,
  ) -> impl Future<Output = Result<LedgerEntry, ApplyFailure<Self::Error>>> + Send + 'a;

  /// Release the underlying connection.
  fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
