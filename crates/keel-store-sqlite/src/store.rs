//! [`SqliteLedger`]: the SQLite implementation of [`LedgerStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use keel_core::{ApplyFailure, LedgerEntry, LedgerStore, MigrationScript};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawEntry, encode_dt, table_name},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// How the ledger is laid out and how long SQLite waits on locks.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
  /// Name of the ledger table. Must be a plain SQL identifier.
  pub table:        String,
  pub busy_timeout: Duration,
}

impl Default for LedgerOptions {
  fn default() -> Self {
    Self {
      table:        "keel_migrations".to_owned(),
      busy_timeout: Duration::from_secs(5),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The migration ledger of one SQLite database, plus the connection that
/// migration scripts run on.
///
/// Holds a single connection for the whole run. Not `Clone`: one run, one
/// ledger handle.
pub struct SqliteLedger {
  conn:  tokio_rusqlite::Connection,
  table: String,
}

/// Which half of a script's transaction failed.
enum Step {
  Execute(rusqlite::Error),
  Record(rusqlite::Error),
}

impl SqliteLedger {
  /// Open (or create) the database at `path` and create the ledger table if
  /// it does not exist yet.
  pub async fn open(path: impl AsRef<Path>, options: LedgerOptions) -> Result<Self> {
    table_name(&options.table)?;
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory database, useful for testing.
  pub async fn open_in_memory(options: LedgerOptions) -> Result<Self> {
    table_name(&options.table)?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  pub fn table(&self) -> &str { &self.table }

  async fn init(conn: tokio_rusqlite::Connection, options: LedgerOptions) -> Result<Self> {
    let LedgerOptions { table, busy_timeout } = options;
    let ddl = format!(
      "CREATE TABLE IF NOT EXISTS {table} (
           name       TEXT PRIMARY KEY,
           checksum   TEXT NOT NULL,
           applied_at TEXT NOT NULL
       );"
    );

    conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;

    debug!(table = %table, "ledger table ready");
    Ok(Self { conn, table })
  }
}

/// Insert one ledger row inside the script's transaction.
fn record(tx: &rusqlite::Transaction<'_>, table: &str, entry: &LedgerEntry) -> rusqlite::Result<()> {
  tx.execute(
    &format!("INSERT INTO {table} (name, checksum, applied_at) VALUES (?1, ?2, ?3)"),
    rusqlite::params![entry.name, entry.checksum, encode_dt(entry.applied_at)],
  )?;
  Ok(())
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteLedger {
  type Error = Error;

  async fn list(&self) -> Result<Vec<LedgerEntry>> {
    let sql = format!(
      "SELECT name, checksum, applied_at FROM {} ORDER BY applied_at, rowid",
      self.table
    );

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEntry {
              name:       row.get(0)?,
              checksum:   row.get(1)?,
              applied_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn apply_script(&self, script: &MigrationScript) -> Result<LedgerEntry, ApplyFailure<Error>> {
    let entry = LedgerEntry {
      name:       script.name.clone(),
      checksum:   script.checksum.clone(),
      applied_at: Utc::now(),
    };

    let content = script.content.clone();
    let table   = self.table.clone();
    let row     = entry.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = tx.execute_batch(&content) {
          return Ok(Err(Step::Execute(e)));
        }
        if let Err(e) = record(&tx, &table, &row) {
          return Ok(Err(Step::Record(e)));
        }
        if let Err(e) = tx.commit() {
          return Ok(Err(Step::Record(e)));
        }
        Ok(Ok(()))
      })
      .await;

    match outcome {
      Ok(Ok(())) => Ok(entry),
      Ok(Err(Step::Execute(e))) => Err(ApplyFailure::Execution(e.into())),
      Ok(Err(Step::Record(e))) => Err(ApplyFailure::LedgerWrite(e.into())),
      Err(e) => Err(ApplyFailure::Execution(e.into())),
    }
  }

  async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}
