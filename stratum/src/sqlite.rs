//! SQLite-backed migration ledger using the
//! [`rusqlite`](https://crates.io/crates/rusqlite) crate.
//!
//! SQLite supports transactional DDL, so a failed `apply_with_tx` or
//! `revert_with_tx` leaves neither the script's effects nor the ledger row
//! behind.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Error;
use crate::ledger::{sanitize_table_name, MigrationLedger};
use crate::migration::Migration;

/// Migration ledger over a [`rusqlite::Connection`].
#[derive(Debug)]
pub struct SqliteLedger {
    conn: Connection,
    table: String,
}

impl SqliteLedger {
    /// Wrap an open connection, validating the table name and ensuring the
    /// ledger table exists.
    pub fn new(conn: Connection, table: impl Into<String>) -> Result<Self, Error> {
        let table = table.into();
        sanitize_table_name(&table)?;
        let mut ledger = Self { conn, table };
        ledger.ensure_table()?;
        Ok(ledger)
    }

    /// Open the database file at `path` and wrap it. The special path
    /// `:memory:` opens an in-memory database.
    pub fn open(path: &str, table: impl Into<String>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::new(conn, table)
    }

    fn ensure_table(&mut self) -> Result<(), Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )?;
        if count == 0 {
            #[cfg(feature = "tracing")]
            tracing::info!(table = %self.table, "creating migration ledger table");
            self.conn.execute(
                &format!(
                    "CREATE TABLE {} (version VARCHAR(255) PRIMARY KEY NOT NULL)",
                    self.table
                ),
                [],
            )?;
        }
        Ok(())
    }
}

impl MigrationLedger for SqliteLedger {
    fn list(&mut self) -> Result<HashMap<String, Migration>, Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT version FROM {}", self.table))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut migrations = HashMap::new();
        for version in rows {
            let version = version?.trim().to_string();
            let mut migration = Migration::new(version.clone(), "");
            migration.applied = true;
            migrations.insert(version, migration);
        }
        Ok(migrations)
    }

    fn is_applied(&mut self, version: &str) -> Result<bool, Error> {
        let row: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE version = ?1", self.table),
                params![version],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    fn apply(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.conn.execute_batch(script)?;
        self.conn.execute(
            &format!("INSERT INTO {}(version) VALUES(?1)", self.table),
            params![migration.version],
        )?;
        Ok(())
    }

    fn apply_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(script)?;
        tx.execute(
            &format!("INSERT INTO {}(version) VALUES(?1)", self.table),
            params![migration.version],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn revert(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.conn.execute_batch(script)?;
        self.conn.execute(
            &format!("DELETE FROM {} WHERE version = ?1", self.table),
            params![migration.version],
        )?;
        Ok(())
    }

    fn revert_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(script)?;
        tx.execute(
            &format!("DELETE FROM {} WHERE version = ?1", self.table),
            params![migration.version],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SqliteLedger {
        let conn = Connection::open_in_memory().unwrap();
        SqliteLedger::new(conn, "stratum_migrations").unwrap()
    }

    fn table_exists(ledger: &SqliteLedger, name: &str) -> bool {
        let count: i64 = ledger
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn construction_creates_the_ledger_table() {
        let ledger = ledger();
        assert!(table_exists(&ledger, "stratum_migrations"));
    }

    #[test]
    fn construction_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = SqliteLedger::new(conn, "stratum_migrations").unwrap();
        let SqliteLedger { conn, table } = ledger;
        SqliteLedger::new(conn, table).unwrap();
    }

    #[test]
    fn invalid_table_names_are_rejected_before_any_sql() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteLedger::new(conn, "stratum_migrations; DROP TABLE x").unwrap_err();
        assert!(matches!(err, Error::InvalidTableName { .. }));

        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteLedger::new(conn, "stratum-migrations").is_err());
    }

    #[test]
    fn apply_executes_script_and_records_version() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "create users");

        ledger
            .apply("CREATE TABLE users(id int PRIMARY KEY);\n", &migration)
            .unwrap();

        assert!(table_exists(&ledger, "users"));
        assert!(ledger.is_applied("001").unwrap());
    }

    #[test]
    fn apply_with_tx_rolls_back_on_failure() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "create users");

        let err = ledger.apply_with_tx(
            "CREATE TABLE users(id int PRIMARY KEY);\nTHIS IS NOT VALID SQL;\n",
            &migration,
        );
        assert!(err.is_err());

        // Neither the script's effect nor the ledger row survived.
        assert!(!table_exists(&ledger, "users"));
        assert!(!ledger.is_applied("001").unwrap());
    }

    #[test]
    fn plain_apply_can_leave_partial_state() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "step");

        ledger.apply("CREATE TABLE t(id int);\n", &migration).unwrap();

        // A second apply of the same version executes its script but fails
        // the bookkeeping insert on the primary key; the script's effect
        // stays behind.
        let err = ledger.apply("INSERT INTO t VALUES (1);\n", &migration);
        assert!(err.is_err());

        let count: i64 = ledger
            .conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn revert_with_tx_removes_row_and_runs_script() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "create users");

        ledger
            .apply_with_tx("CREATE TABLE users(id int PRIMARY KEY);\n", &migration)
            .unwrap();
        ledger
            .revert_with_tx("DROP TABLE users;\n", &migration)
            .unwrap();

        assert!(!table_exists(&ledger, "users"));
        assert!(!ledger.is_applied("001").unwrap());
    }

    #[test]
    fn revert_with_tx_rolls_back_on_failure() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "create users");

        ledger
            .apply_with_tx("CREATE TABLE users(id int PRIMARY KEY);\n", &migration)
            .unwrap();
        let err = ledger.revert_with_tx("NOT SQL AT ALL;\n", &migration);
        assert!(err.is_err());

        assert!(table_exists(&ledger, "users"));
        assert!(ledger.is_applied("001").unwrap());
    }

    #[test]
    fn list_returns_applied_versions_with_empty_messages() {
        let mut ledger = ledger();
        for version in ["001", "002"] {
            ledger
                .apply_with_tx("", &Migration::new(version, "step"))
                .unwrap();
        }

        let listed = ledger.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed["001"].applied);
        assert_eq!(listed["001"].message, "");
        assert!(listed.contains_key("002"));
    }

    #[test]
    fn is_applied_is_false_for_unknown_versions() {
        let mut ledger = ledger();
        assert!(!ledger.is_applied("999").unwrap());
    }

    #[test]
    fn empty_scripts_execute_as_a_no_op() {
        let mut ledger = ledger();
        let migration = Migration::new("001", "noop");
        ledger.apply_with_tx("", &migration).unwrap();
        assert!(ledger.is_applied("001").unwrap());
    }
}
