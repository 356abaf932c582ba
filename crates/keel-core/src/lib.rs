//! Core types and algorithms for the Keel migration engine.
//!
//! This crate is deliberately free of database dependencies. It discovers and
//! orders migration scripts, verifies them against a ledger, and drives any
//! [`LedgerStore`] backend through the apply and recovery workflows.

pub mod applier;
pub mod checksum;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod migrator;
pub mod recovery;
pub mod script;
pub mod status;

pub use applier::apply;
pub use checksum::checksum;
pub use error::{Error, LoadError, Result};
pub use ledger::{ApplyFailure, LedgerEntry, LedgerStore};
pub use migrator::{Migrator, migrate};
pub use recovery::{LegacyRename, recover_legacy_rename_and_apply};
pub use script::{MigrationScript, MigrationSet};
pub use status::{MigrationState, MigrationStatus, status};
