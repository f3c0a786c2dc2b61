//! The database-resident record of applied migrations.
//!
//! A [`MigrationLedger`] executes migration scripts against the target
//! database and tracks which versions have been applied, one row per version
//! in a configurable table. Implementations exist per SQL dialect
//! ([`SqliteLedger`](crate::sqlite::SqliteLedger),
//! [`MysqlLedger`](crate::mysql::MysqlLedger),
//! [`PostgresLedger`](crate::postgres::PostgresLedger)); the orchestrator
//! only sees this trait.

use std::collections::HashMap;

use regex::Regex;

use crate::error::Error;
use crate::migration::Migration;

/// Tracks applied versions and executes scripts, optionally inside a
/// transaction.
///
/// The `_with_tx` variants wrap the script execution and the ledger write in
/// one database transaction that rolls back on any failure. The plain
/// variants perform the two steps independently and can leave inconsistent
/// state if the second step fails; callers choose based on the script's
/// declared execution options.
///
/// Ledger methods never mutate the passed [`Migration`]; the orchestrator
/// owns the in-memory `applied` flag.
pub trait MigrationLedger {
    /// The set of recorded versions, keyed by version. The message field of
    /// returned migrations is always empty; the ledger never stores human
    /// text.
    fn list(&mut self) -> Result<HashMap<String, Migration>, Error>;

    /// Whether the given version has a ledger row. Absence is a normal
    /// `false` result, not an error.
    fn is_applied(&mut self, version: &str) -> Result<bool, Error>;

    /// Execute the upgrade script, then insert a row for the migration's
    /// version. The two steps are not atomic.
    fn apply(&mut self, script: &str, migration: &Migration) -> Result<(), Error>;

    /// Like [`apply`](Self::apply), but both steps run in one transaction
    /// with automatic rollback on failure.
    fn apply_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error>;

    /// Execute the downgrade script, then delete the migration's row. The
    /// two steps are not atomic.
    fn revert(&mut self, script: &str, migration: &Migration) -> Result<(), Error>;

    /// Like [`revert`](Self::revert), but both steps run in one transaction
    /// with automatic rollback on failure.
    fn revert_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error>;
}

/// Validate a ledger table name against the identifier allow-list.
///
/// Table names cannot be passed as parameterized query arguments, so this
/// check is the sole injection defense and must pass before the name is ever
/// interpolated into executed SQL. Letters, digits, and underscores are
/// allowed, with at most one dot separating an optional schema qualifier.
pub fn sanitize_table_name(name: &str) -> Result<(), Error> {
    let allowed = Regex::new(r"^[a-zA-Z0-9_]+(\.[a-zA-Z0-9_]+)?$").expect("valid pattern");
    if allowed.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidTableName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_schema_qualified_names_are_accepted() {
        sanitize_table_name("stratum_migrations").unwrap();
        sanitize_table_name("custom_schema.stratum_migrations").unwrap();
        sanitize_table_name("Migrations01").unwrap();
    }

    #[test]
    fn injection_and_punctuation_are_rejected() {
        assert!(matches!(
            sanitize_table_name("stratum_migrations; DROP TABLE x"),
            Err(Error::InvalidTableName { .. })
        ));
        assert!(matches!(
            sanitize_table_name("stratum-migrations"),
            Err(Error::InvalidTableName { .. })
        ));
        assert!(matches!(
            sanitize_table_name("a.b.c"),
            Err(Error::InvalidTableName { .. })
        ));
        assert!(matches!(
            sanitize_table_name(""),
            Err(Error::InvalidTableName { .. })
        ));
        assert!(matches!(
            sanitize_table_name("tbl "),
            Err(Error::InvalidTableName { .. })
        ));
    }
}
