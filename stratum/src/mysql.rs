//! MySQL-backed migration ledger using the
//! [`mysql`](https://crates.io/crates/mysql) crate.
//!
//! DDL statements in MySQL cause an implicit commit and cannot be rolled
//! back, even inside `apply_with_tx`. A failed transactional apply still
//! leaves the ledger row unwritten, so the migration can be fixed and
//! re-run, but schema changes that already executed remain applied.

use std::collections::HashMap;

use mysql::prelude::Queryable;
use mysql::{Conn, TxOpts};

use crate::error::Error;
use crate::ledger::{sanitize_table_name, MigrationLedger};
use crate::migration::Migration;

/// Migration ledger over a [`mysql::Conn`].
pub struct MysqlLedger {
    conn: Conn,
    table: String,
}

impl MysqlLedger {
    /// Wrap an open connection, validating the table name and ensuring the
    /// ledger table exists.
    pub fn new(conn: Conn, table: impl Into<String>) -> Result<Self, Error> {
        let table = table.into();
        sanitize_table_name(&table)?;
        let mut ledger = Self { conn, table };
        ledger.ensure_table()?;
        Ok(ledger)
    }

    fn ensure_table(&mut self) -> Result<(), Error> {
        // MySQL has no schemas; the currently selected database plays that
        // role, and connecting without one selected makes the probe fail.
        let exists: Option<(i64,)> = self.conn.exec_first(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
            (&self.table,),
        )?;
        if exists.is_none() {
            #[cfg(feature = "tracing")]
            tracing::info!(table = %self.table, "creating migration ledger table");
            self.conn.query_drop(format!(
                "CREATE TABLE {} (version VARCHAR(255) PRIMARY KEY NOT NULL)",
                self.table
            ))?;
        }
        Ok(())
    }
}

impl MigrationLedger for MysqlLedger {
    fn list(&mut self) -> Result<HashMap<String, Migration>, Error> {
        let versions: Vec<String> = self
            .conn
            .query(format!("SELECT version FROM {}", self.table))?;

        let mut migrations = HashMap::new();
        for version in versions {
            let version = version.trim().to_string();
            let mut migration = Migration::new(version.clone(), "");
            migration.applied = true;
            migrations.insert(version, migration);
        }
        Ok(migrations)
    }

    fn is_applied(&mut self, version: &str) -> Result<bool, Error> {
        let row: Option<(i64,)> = self.conn.exec_first(
            format!("SELECT 1 FROM {} WHERE version = ?", self.table),
            (version,),
        )?;
        Ok(row.is_some())
    }

    fn apply(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.conn.query_drop(script)?;
        self.conn.exec_drop(
            format!("INSERT INTO {}(version) VALUES(?)", self.table),
            (&migration.version,),
        )?;
        Ok(())
    }

    fn apply_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        tx.query_drop(script)?;
        tx.exec_drop(
            format!("INSERT INTO {}(version) VALUES(?)", self.table),
            (&migration.version,),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn revert(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.conn.query_drop(script)?;
        self.conn.exec_drop(
            format!("DELETE FROM {} WHERE version = ?", self.table),
            (&migration.version,),
        )?;
        Ok(())
    }

    fn revert_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        tx.query_drop(script)?;
        tx.exec_drop(
            format!("DELETE FROM {} WHERE version = ?", self.table),
            (&migration.version,),
        )?;
        tx.commit()?;
        Ok(())
    }
}
