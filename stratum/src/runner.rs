//! The migration orchestrator.
//!
//! [`Migrator`] composes a [`MigrationSource`], a [`MigrationLedger`], and
//! the script parser to compute which migrations are outstanding, order
//! them under the configured [`VersionStyle`], and drive apply/revert.
//!
//! Every operation is a single synchronous sequence. The only recovery
//! primitive is the database transaction wrapping one migration's script
//! execution plus its ledger write; sequences across migrations are
//! fail-fast with no compensating rollback, so migrations applied before a
//! failure stay applied.

use std::time::Instant;

use chrono::Utc;

use crate::error::Error;
use crate::ledger::MigrationLedger;
use crate::migration::{Migration, VersionStyle};
use crate::report::Reporter;
use crate::source::MigrationSource;
use crate::sqlparse;

/// Listing order for [`Migrator::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Drives migrations from a source against a ledger.
pub struct Migrator {
    source: Box<dyn MigrationSource>,
    ledger: Box<dyn MigrationLedger>,
    style: VersionStyle,
    reporter: Box<dyn Reporter>,
}

impl Migrator {
    pub fn new(
        source: Box<dyn MigrationSource>,
        ledger: Box<dyn MigrationLedger>,
        style: VersionStyle,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            ledger,
            style,
            reporter,
        }
    }

    /// List all local migrations with their applied state, sorted under the
    /// configured version style.
    ///
    /// A migration is applied iff its version has a ledger row. Ledger
    /// entries with no local counterpart are dropped: every applied version
    /// is assumed to have a corresponding local file, and violations are
    /// silently invisible here rather than errors.
    pub fn list(&mut self, order: SortOrder) -> Result<Vec<Migration>, Error> {
        let local = self
            .source
            .list()
            .map_err(|e| Error::Generic(format!("unable to list out local migrations: {e}")))?;
        let applied = self.ledger.list().map_err(|e| {
            Error::Generic(format!(
                "unable to list out applied migrations from the database: {e}"
            ))
        })?;

        let mut migrations: Vec<Migration> = Vec::with_capacity(local.len());
        for (_, mut migration) in local {
            migration.applied = applied.contains_key(&migration.version);
            migrations.push(migration);
        }

        self.sorted(migrations, order)
    }

    /// Sort migrations by the configured style. If any version fails to
    /// parse, all such errors are collected and the whole listing aborts:
    /// ordering guarantees are never silently violated by a partially
    /// sorted result.
    fn sorted(
        &self,
        migrations: Vec<Migration>,
        order: SortOrder,
    ) -> Result<Vec<Migration>, Error> {
        let mut errors = Vec::new();
        let mut keyed = Vec::with_capacity(migrations.len());
        for migration in migrations {
            match self.style.sort_key(&migration.version) {
                Ok(key) => keyed.push((key, migration)),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(Error::Sort(errors));
        }

        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if order == SortOrder::Desc {
            keyed.reverse();
        }
        Ok(keyed.into_iter().map(|(_, m)| m).collect())
    }

    /// Apply every outstanding migration in ascending order, stopping at the
    /// first failure.
    pub fn apply_all(&mut self) -> Result<(), Error> {
        let mut migrations = self.list(SortOrder::Asc)?;
        for migration in &mut migrations {
            if !migration.applied {
                self.apply(migration)?;
            }
        }
        Ok(())
    }

    /// Apply outstanding migrations in ascending order, up to and including
    /// the given version.
    pub fn apply_up_to(&mut self, version: &str) -> Result<(), Error> {
        let mut migrations = self.list(SortOrder::Asc)?;

        let target_applied = match migrations.iter().find(|m| m.version == version) {
            None => {
                return Err(Error::VersionNotFound {
                    version: version.to_string(),
                })
            }
            Some(target) => target.applied,
        };
        if target_applied {
            // Assumption: if the target migration is applied, all migrations
            // ordered before it are also applied.
            return Err(Error::AlreadyApplied {
                version: version.to_string(),
            });
        }

        for migration in &mut migrations {
            if !migration.applied {
                self.apply(migration)?;
            }
            if migration.version == version {
                break;
            }
        }
        Ok(())
    }

    /// Apply one migration: parse its upgrade script and run it through the
    /// ledger's transactional or plain path per the script's declared
    /// execution options. On success the in-memory `applied` flag flips to
    /// true; on failure it is left unchanged.
    pub fn apply(&mut self, migration: &mut Migration) -> Result<(), Error> {
        self.reporter
            .report(&format!("Applying migration {}..", migration.name()));
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("migration_up", version = %migration.version).entered();

        let started = Instant::now();

        let raw = self.source.read_upgrade_script(migration)?;
        let parsed = sqlparse::parse(raw.as_bytes()).map_err(|e| {
            Error::Generic(format!("unable to parse sql file for upgrade script: {e}"))
        })?;
        let script = parsed.upgrade;

        let result = if script.options.use_transaction {
            self.ledger.apply_with_tx(&script.contents, migration)
        } else {
            self.ledger.apply(&script.contents, migration)
        };
        result.map_err(|e| Error::Apply {
            name: migration.name(),
            source: Box::new(e),
        })?;

        migration.applied = true;
        let elapsed = started.elapsed();
        #[cfg(feature = "tracing")]
        tracing::info!(duration_ms = elapsed.as_millis() as u64, "migration applied");
        self.reporter.report(&format!(
            "Successfully applied migration {} in {:.2?}!",
            migration.name(),
            elapsed
        ));
        Ok(())
    }

    /// Revert every applied migration in descending order, stopping at the
    /// first failure.
    pub fn revert_all(&mut self) -> Result<(), Error> {
        let mut migrations = self.list(SortOrder::Desc)?;
        for migration in &mut migrations {
            if migration.applied {
                self.revert(migration)?;
            }
        }
        Ok(())
    }

    /// Revert applied migrations in descending order, down to and including
    /// the given version.
    pub fn revert_down_to(&mut self, version: &str) -> Result<(), Error> {
        let mut migrations = self.list(SortOrder::Desc)?;

        let target_applied = match migrations.iter().find(|m| m.version == version) {
            None => {
                return Err(Error::VersionNotFound {
                    version: version.to_string(),
                })
            }
            Some(target) => target.applied,
        };
        if !target_applied {
            return Err(Error::NotApplied {
                version: version.to_string(),
            });
        }

        for migration in &mut migrations {
            if migration.applied {
                self.revert(migration)?;
            }
            if migration.version == version {
                break;
            }
        }
        Ok(())
    }

    /// Revert one migration, the mirror of [`apply`](Self::apply): the
    /// downgrade script runs through the ledger's transactional or plain
    /// revert path and `applied` flips to false on success.
    pub fn revert(&mut self, migration: &mut Migration) -> Result<(), Error> {
        self.reporter
            .report(&format!("Reverting migration {}..", migration.name()));
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("migration_down", version = %migration.version).entered();

        let started = Instant::now();

        let raw = self.source.read_downgrade_script(migration)?;
        let parsed = sqlparse::parse(raw.as_bytes()).map_err(|e| {
            Error::Generic(format!(
                "unable to parse sql file for downgrade script: {e}"
            ))
        })?;
        let script = parsed.downgrade;

        let result = if script.options.use_transaction {
            self.ledger.revert_with_tx(&script.contents, migration)
        } else {
            self.ledger.revert(&script.contents, migration)
        };
        result.map_err(|e| Error::Revert {
            name: migration.name(),
            source: Box::new(e),
        })?;

        migration.applied = false;
        let elapsed = started.elapsed();
        #[cfg(feature = "tracing")]
        tracing::info!(duration_ms = elapsed.as_millis() as u64, "migration reverted");
        self.reporter.report(&format!(
            "Successfully reverted migration {} in {:.2?}!",
            migration.name(),
            elapsed
        ));
        Ok(())
    }

    /// Create a new migration skeleton and return the constructed migration.
    ///
    /// Timestamp style stamps the current instant; sequential style assigns
    /// one more than the numeric maximum of the existing local versions
    /// (starting at 1), erroring if any existing version does not parse as
    /// an integer.
    pub fn create(&self, message: &str) -> Result<Migration, Error> {
        let migration = match self.style {
            VersionStyle::Timestamp => Migration::timestamp(Utc::now(), message),
            VersionStyle::Sequential => {
                let current = self.current_sequential_version()?;
                Migration::sequential(current + 1, message)
            }
        };

        self.source.create(&migration)?;
        self.reporter.report(&format!(
            "Created migration {} - {}.",
            migration.version, migration.message
        ));
        Ok(migration)
    }

    fn current_sequential_version(&self) -> Result<u64, Error> {
        let mut current = 0;
        for version in self.source.list()?.keys() {
            let parsed = version
                .parse::<u64>()
                .map_err(|e| Error::MalformedVersion {
                    version: version.clone(),
                    reason: e.to_string(),
                })?;
            current = current.max(parsed);
        }
        Ok(current)
    }
}
