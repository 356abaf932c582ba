//! Integration tests for `SqliteLedger` and the migration workflows against
//! SQLite databases in temporary directories.

use std::{fs, path::PathBuf};

use keel_core::{
  ApplyFailure, Error as CoreError, LedgerStore, LegacyRename, Migrator, checksum,
};
use tempfile::TempDir;

use crate::{Error, LedgerOptions, SqliteLedger, apply_migrations};

const INIT: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);";
const USER_FIELDS: &str = "ALTER TABLE users ADD COLUMN display_name TEXT;";
const ROLES: &str = "CREATE TABLE roles (role TEXT PRIMARY KEY);";
const BROKEN: &str = "CREATE TABLE oops (id INTEGER;";

struct Fixture {
  _tmp:       TempDir,
  migrations: PathBuf,
  db:         PathBuf,
}

impl Fixture {
  fn new() -> Self {
    let tmp = tempfile::tempdir().expect("tempdir");
    let migrations = tmp.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    let db = tmp.path().join("keel.db");
    Self { _tmp: tmp, migrations, db }
  }

  fn write(&self, file_name: &str, content: &str) {
    fs::write(self.migrations.join(file_name), content).unwrap();
  }

  fn rename(&self, from: &str, to: &str) {
    fs::rename(self.migrations.join(from), self.migrations.join(to)).unwrap();
  }

  fn exists(&self, file_name: &str) -> bool { self.migrations.join(file_name).exists() }

  fn migrator(&self) -> Migrator { Migrator::new(&self.migrations) }

  async fn run(&self) -> crate::Result<usize> {
    apply_migrations(&self.db, &self.migrator(), LedgerOptions::default()).await
  }

  /// Ledger rows `(name, checksum)` in application order, read over a
  /// separate connection.
  fn ledger(&self) -> Vec<(String, String)> {
    let conn = rusqlite::Connection::open(&self.db).unwrap();
    let mut stmt = conn
      .prepare("SELECT name, checksum FROM keel_migrations ORDER BY applied_at, rowid")
      .unwrap();
    stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
      .unwrap()
      .collect::<rusqlite::Result<Vec<_>>>()
      .unwrap()
  }

  fn ledger_names(&self) -> Vec<String> { self.ledger().into_iter().map(|(n, _)| n).collect() }

  fn table_exists(&self, table: &str) -> bool {
    let conn = rusqlite::Connection::open(&self.db).unwrap();
    conn
      .query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
      )
      .unwrap()
      == 1
  }

  fn count(&self, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(&self.db).unwrap();
    conn
      .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))
      .unwrap()
  }
}

fn core_err(result: crate::Result<usize>) -> CoreError {
  match result {
    Err(Error::Core(e)) => e,
    other => panic!("expected a migration error, got {other:?}"),
  }
}

// ─── Ledger store ────────────────────────────────────────────────────────────

#[tokio::test]
async fn ledger_table_creation_is_idempotent() {
  let f = Fixture::new();

  let first = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  first.close().await.unwrap();

  let second = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  assert!(second.list().await.unwrap().is_empty());
  second.close().await.unwrap();

  assert!(f.table_exists("keel_migrations"));
}

#[tokio::test]
async fn invalid_table_name_is_rejected_before_opening() {
  let f = Fixture::new();
  let options = LedgerOptions { table: "auth.migrations".into(), ..Default::default() };

  let result = SqliteLedger::open(&f.db, options).await;
  assert!(matches!(result, Err(Error::InvalidTableName(ref t)) if t == "auth.migrations"));
  assert!(!f.db.exists());
}

#[tokio::test]
async fn custom_table_name() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);

  let options = LedgerOptions { table: "auth_migrations".into(), ..Default::default() };
  let applied = apply_migrations(&f.db, &f.migrator(), options).await.unwrap();

  assert_eq!(applied, 1);
  assert!(f.table_exists("auth_migrations"));
  assert!(!f.table_exists("keel_migrations"));
}

#[tokio::test]
async fn failed_ledger_write_rolls_back_the_script() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("00002_seed.sql", "INSERT INTO users (email) VALUES ('a@example.com');");

  let ledger = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  let set = f.migrator().load().unwrap();
  let seed = set.get("00002_seed").unwrap();

  assert_eq!(keel_core::apply(&set, &ledger).await.unwrap(), 2);

  // Re-applying directly bypasses the pending check; the insert of the
  // duplicate ledger row must fail and take the seed row with it.
  let result = ledger.apply_script(seed).await;
  assert!(matches!(result, Err(ApplyFailure::LedgerWrite(_))));

  assert_eq!(ledger.list().await.unwrap().len(), 2);
  ledger.close().await.unwrap();
  assert_eq!(f.count("users"), 1);
}

#[tokio::test]
async fn in_memory_ledger_applies_scripts() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);

  let ledger = SqliteLedger::open_in_memory(LedgerOptions::default()).await.unwrap();
  assert_eq!(ledger.table(), "keel_migrations");
  assert_eq!(f.migrator().apply(&ledger).await.unwrap(), 1);
  assert_eq!(f.migrator().apply(&ledger).await.unwrap(), 0);
  ledger.close().await.unwrap();
}

#[tokio::test]
async fn list_returns_checksums_and_timestamps() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);

  let ledger = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  let before = chrono::Utc::now();
  f.migrator().apply(&ledger).await.unwrap();

  let entries = ledger.list().await.unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].name, "00001_init");
  assert_eq!(entries[0].checksum, checksum(INIT.as_bytes()));
  assert!(entries[0].applied_at >= before - chrono::Duration::milliseconds(1));
  ledger.close().await.unwrap();
}

// ─── Applier ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn applies_pending_scripts_in_order() {
  let f = Fixture::new();
  f.write("00002_user_fields.sql", USER_FIELDS);
  f.write("00001_init.sql", INIT);

  assert_eq!(f.run().await.unwrap(), 2);
  assert_eq!(f.ledger_names(), ["00001_init", "00002_user_fields"]);
  assert!(f.table_exists("users"));
}

#[tokio::test]
async fn second_run_is_a_no_op() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("00002_user_fields.sql", USER_FIELDS);

  assert_eq!(f.run().await.unwrap(), 2);
  let ledger_before = f.ledger();

  assert_eq!(f.run().await.unwrap(), 0);
  assert_eq!(f.ledger(), ledger_before);
}

#[tokio::test]
async fn later_scripts_are_applied_after_earlier_ones() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("00002_roles.sql", ROLES);

  f.run().await.unwrap();

  let ledger = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  let entries = ledger.list().await.unwrap();
  ledger.close().await.unwrap();

  assert_eq!(entries[0].name, "00001_init");
  assert_eq!(entries[1].name, "00002_roles");
  assert!(entries[0].applied_at <= entries[1].applied_at);
}

#[tokio::test]
async fn failing_script_stops_the_run() {
  let f = Fixture::new();
  f.write("00001_broken.sql", BROKEN);
  f.write("00002_roles.sql", ROLES);

  let err = core_err(f.run().await);
  assert!(matches!(err, CoreError::Execution { ref name, .. } if name == "00001_broken"));
  assert!(f.ledger().is_empty());
  assert!(!f.table_exists("roles"));
}

#[tokio::test]
async fn edited_script_is_a_ledger_conflict() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.run().await.unwrap();
  let ledger_before = f.ledger();

  f.write("00001_init.sql", "CREATE TABLE users (id TEXT PRIMARY KEY);");
  f.write("00002_roles.sql", ROLES);

  match core_err(f.run().await) {
    CoreError::LedgerConflict { name, expected, actual } => {
      assert_eq!(name, "00001_init");
      assert_eq!(expected, checksum(INIT.as_bytes()));
      assert_eq!(actual, checksum(b"CREATE TABLE users (id TEXT PRIMARY KEY);"));
    }
    other => panic!("expected ledger conflict, got {other:?}"),
  }

  assert_eq!(f.ledger(), ledger_before);
  assert!(!f.table_exists("roles"));
}

#[tokio::test]
async fn partial_run_resumes_where_it_stopped() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("00002_roles.sql", BROKEN);
  f.write("00003_user_fields.sql", USER_FIELDS);

  let err = core_err(f.run().await);
  assert!(matches!(err, CoreError::Execution { ref name, .. } if name == "00002_roles"));
  assert_eq!(f.ledger_names(), ["00001_init"]);

  f.write("00002_roles.sql", ROLES);
  assert_eq!(f.run().await.unwrap(), 2);
  assert_eq!(f.ledger_names(), ["00001_init", "00002_roles", "00003_user_fields"]);
}

#[tokio::test]
async fn load_errors_are_surfaced() {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("01_again.sql", ROLES);

  let err = core_err(f.run().await);
  assert!(matches!(
    err,
    CoreError::Load(keel_core::LoadError::DuplicateSequence { sequence: 1, .. })
  ));
}

// ─── Legacy rename recovery ──────────────────────────────────────────────────

/// A ledger written by the release that shipped `00002_custom-user-fields`,
/// followed by the current release's file name.
async fn legacy_fixture() -> Fixture {
  let f = Fixture::new();
  f.write("00001_init.sql", INIT);
  f.write("00002_custom-user-fields.sql", USER_FIELDS);
  f.run().await.unwrap();
  f.rename("00002_custom-user-fields.sql", "00002_custom_user_fields.sql");
  f
}

#[tokio::test]
async fn plain_apply_fails_on_legacy_name() {
  let f = legacy_fixture().await;

  let ledger = SqliteLedger::open(&f.db, LedgerOptions::default()).await.unwrap();
  let err = f.migrator().apply(&ledger).await.unwrap_err();
  ledger.close().await.unwrap();

  assert!(matches!(err, CoreError::MigrationMissing { ref name } if name == "00002_custom-user-fields"));
}

#[tokio::test]
async fn legacy_recovery_round_trip() {
  let f = legacy_fixture().await;
  f.write("00003_roles.sql", ROLES);

  assert_eq!(f.run().await.unwrap(), 1);

  assert!(f.exists("00002_custom_user_fields.sql"));
  assert!(!f.exists("00002_custom-user-fields.sql"));
  assert_eq!(f.ledger(), [
    ("00001_init".to_owned(), checksum(INIT.as_bytes())),
    ("00002_custom-user-fields".to_owned(), checksum(USER_FIELDS.as_bytes())),
    ("00003_roles".to_owned(), checksum(ROLES.as_bytes())),
  ]);
  assert!(f.table_exists("roles"));

  // Later runs take the same path and stay a no-op.
  assert_eq!(f.run().await.unwrap(), 0);
  assert!(f.exists("00002_custom_user_fields.sql"));
}

#[tokio::test]
async fn failure_during_recovery_still_restores_name() {
  let f = legacy_fixture().await;
  f.write("00003_broken.sql", BROKEN);

  let err = core_err(f.run().await);
  assert!(matches!(err, CoreError::Execution { ref name, .. } if name == "00003_broken"));

  assert!(f.exists("00002_custom_user_fields.sql"));
  assert!(!f.exists("00002_custom-user-fields.sql"));
  assert_eq!(f.ledger_names(), ["00001_init", "00002_custom-user-fields"]);
}

#[tokio::test]
async fn unrelated_failures_do_not_rename() {
  let f = legacy_fixture().await;
  f.write("00001_init.sql", "CREATE TABLE users (id TEXT);");

  let err = core_err(f.run().await);
  assert!(matches!(err, CoreError::LedgerConflict { ref name, .. } if name == "00001_init"));
  assert!(f.exists("00002_custom_user_fields.sql"));
  assert!(!f.exists("00002_custom-user-fields.sql"));
}

#[tokio::test]
async fn legacy_recovery_needs_canonical_script() {
  let f = legacy_fixture().await;
  fs::remove_file(f.migrations.join("00002_custom_user_fields.sql")).unwrap();

  let err = core_err(f.run().await);
  assert!(err.concerns("00002_custom-user-fields"));
  assert_eq!(fs::read_dir(&f.migrations).unwrap().count(), 1);
}

#[tokio::test]
async fn legacy_rename_table_is_configurable() {
  let f = Fixture::new();
  f.write("00001_init-schema.sql", INIT);
  f.run().await.unwrap();
  f.rename("00001_init-schema.sql", "00001_init_schema.sql");

  let migrator = f
    .migrator()
    .with_legacy_renames(vec![LegacyRename::new("00001_init-schema", "00001_init_schema")]);
  let applied = apply_migrations(&f.db, &migrator, LedgerOptions::default()).await.unwrap();

  assert_eq!(applied, 0);
  assert!(f.exists("00001_init_schema.sql"));

  // Without the entry the drift is fatal.
  let err = core_err(
    apply_migrations(&f.db, &f.migrator().with_legacy_renames(vec![]), LedgerOptions::default())
      .await,
  );
  assert!(err.concerns("00001_init-schema"));
}
