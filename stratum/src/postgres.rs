//! PostgreSQL-backed migration ledger using the
//! [`postgres`](https://crates.io/crates/postgres) crate.
//!
//! PostgreSQL fully supports transactional DDL, so a failed `apply_with_tx`
//! or `revert_with_tx` rolls back both the script's changes and the ledger
//! write.

use std::collections::HashMap;

use postgres::Client;

use crate::error::Error;
use crate::ledger::{sanitize_table_name, MigrationLedger};
use crate::migration::Migration;

/// Migration ledger over a [`postgres::Client`].
pub struct PostgresLedger {
    client: Client,
    table: String,
}

impl PostgresLedger {
    /// Wrap an open client, validating the table name and ensuring the
    /// ledger table exists.
    pub fn new(client: Client, table: impl Into<String>) -> Result<Self, Error> {
        let table = table.into();
        sanitize_table_name(&table)?;
        let mut ledger = Self { client, table };
        ledger.ensure_table()?;
        Ok(ledger)
    }

    fn ensure_table(&mut self) -> Result<(), Error> {
        // The existence probe is limited to the 'public' schema; a ledger
        // table under another schema qualifier will not be found here.
        let row = self.client.query_one(
            "SELECT EXISTS (
                SELECT FROM pg_catalog.pg_class c
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = 'public'
                AND c.relname = $1
                AND c.relkind = 'r'
            )",
            &[&self.table],
        )?;
        let exists: bool = row.get(0);
        if !exists {
            #[cfg(feature = "tracing")]
            tracing::info!(table = %self.table, "creating migration ledger table");
            self.client.execute(
                &format!(
                    "CREATE TABLE {} (version VARCHAR(255) PRIMARY KEY NOT NULL)",
                    self.table
                ),
                &[],
            )?;
        }
        Ok(())
    }
}

impl MigrationLedger for PostgresLedger {
    fn list(&mut self) -> Result<HashMap<String, Migration>, Error> {
        let rows = self
            .client
            .query(&format!("SELECT version FROM {}", self.table), &[])?;

        let mut migrations = HashMap::new();
        for row in rows {
            let version: String = row.get(0);
            let version = version.trim().to_string();
            let mut migration = Migration::new(version.clone(), "");
            migration.applied = true;
            migrations.insert(version, migration);
        }
        Ok(migrations)
    }

    fn is_applied(&mut self, version: &str) -> Result<bool, Error> {
        let row = self.client.query_opt(
            &format!("SELECT 1 FROM {} WHERE version = $1", self.table),
            &[&version],
        )?;
        Ok(row.is_some())
    }

    fn apply(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.client.batch_execute(script)?;
        self.client.execute(
            &format!("INSERT INTO {}(version) VALUES($1)", self.table),
            &[&migration.version],
        )?;
        Ok(())
    }

    fn apply_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut tx = self.client.transaction()?;
        tx.batch_execute(script)?;
        tx.execute(
            &format!("INSERT INTO {}(version) VALUES($1)", self.table),
            &[&migration.version],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn revert(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        self.client.batch_execute(script)?;
        self.client.execute(
            &format!("DELETE FROM {} WHERE version = $1", self.table),
            &[&migration.version],
        )?;
        Ok(())
    }

    fn revert_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut tx = self.client.transaction()?;
        tx.batch_execute(script)?;
        tx.execute(
            &format!("DELETE FROM {} WHERE version = $1", self.table),
            &[&migration.version],
        )?;
        tx.commit()?;
        Ok(())
    }
}
