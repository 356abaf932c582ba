//! Encoding helpers between ledger values and their SQLite column text.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision so
//! that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use keel_core::LedgerEntry;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Table name ──────────────────────────────────────────────────────────────

/// Accept `[A-Za-z_][A-Za-z0-9_]*` and return it unchanged.
pub fn table_name(name: &str) -> Result<&str> {
  let mut chars = name.chars();
  let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid { Ok(name) } else { Err(Error::InvalidTableName(name.to_owned())) }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A ledger row exactly as read from SQLite.
pub struct RawEntry {
  pub name:       String,
  pub checksum:   String,
  pub applied_at: String,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
      name:       self.name,
      checksum:   self.checksum,
      applied_at: decode_dt(&self.applied_at)?,
    })
  }
}
