//! Typed command-surface wrappers (spec §4.5, plus the supplemented
//! PICC/ISO primitives): thin argument marshalling on top of
//! [`crate::Desfire::exchange`]/[`crate::Desfire::select_application`].
//!
//! Organized by the grouping the original client used for its own command
//! table: PICC-level housekeeping, application directory, file lifecycle,
//! the four file-body families (data/value/record/transaction-MAC), and
//! the ISO 7816 primitives.

mod application;
mod data;
mod file;
mod iso;
mod picc;
mod record;
mod transaction;
mod value;

pub use picc::{ComponentVersion, VersionInfo};
