//! In-memory fakes for exercising the migration engine without a database
//! or a filesystem.
//!
//! [`MemorySource`] and [`MemoryLedger`] are handle types: cloning one
//! shares its state, so a test can keep a handle for assertions while the
//! [`Migrator`](crate::Migrator) owns the boxed fake.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::error::Error;
use crate::ledger::MigrationLedger;
use crate::migration::Migration;
use crate::report::Reporter;
use crate::source::{MigrationSource, SCRIPT_TEMPLATE};

/// Backing state of a [`MemorySource`].
#[derive(Debug, Default)]
pub struct SourceState {
    pub migrations: HashMap<String, Migration>,
    /// Raw file text per version, as the parser would receive it.
    pub scripts: HashMap<String, String>,
}

/// An in-memory [`MigrationSource`].
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Rc<RefCell<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration with the given raw file text.
    pub fn with_migration(self, version: &str, message: &str, file_text: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state
                .migrations
                .insert(version.to_string(), Migration::new(version, message));
            state
                .scripts
                .insert(version.to_string(), file_text.to_string());
        }
        self
    }

    /// A shared handle onto the backing state for assertions.
    pub fn state(&self) -> Rc<RefCell<SourceState>> {
        Rc::clone(&self.state)
    }

    fn read_script(&self, migration: &Migration) -> Result<String, Error> {
        self.state
            .borrow()
            .scripts
            .get(&migration.version)
            .cloned()
            .ok_or_else(|| {
                Error::Generic(format!(
                    "no script registered for migration {}",
                    migration.version
                ))
            })
    }
}

impl MigrationSource for MemorySource {
    fn create(&self, migration: &Migration) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state
            .migrations
            .insert(migration.version.clone(), migration.clone());
        state
            .scripts
            .insert(migration.version.clone(), SCRIPT_TEMPLATE.to_string());
        Ok(())
    }

    fn list(&self) -> Result<HashMap<String, Migration>, Error> {
        Ok(self.state.borrow().migrations.clone())
    }

    fn latest(&self) -> Result<Option<Migration>, Error> {
        let state = self.state.borrow();
        let mut migrations: Vec<&Migration> = state.migrations.values().collect();
        migrations.sort_by_key(|m| m.name());
        Ok(migrations.pop().cloned())
    }

    fn read_upgrade_script(&self, migration: &Migration) -> Result<String, Error> {
        self.read_script(migration)
    }

    fn read_downgrade_script(&self, migration: &Migration) -> Result<String, Error> {
        self.read_script(migration)
    }
}

/// Backing state of a [`MemoryLedger`].
#[derive(Debug, Default)]
pub struct LedgerState {
    pub applied: BTreeSet<String>,
    /// Script contents in execution order, across both directions.
    pub executed_scripts: Vec<String>,
    /// Versions reverted, in revert order.
    pub reverted_order: Vec<String>,
    pub tx_applies: u32,
    pub plain_applies: u32,
    pub tx_reverts: u32,
    pub plain_reverts: u32,
    /// When set, any apply/revert of this version fails before executing.
    pub fail_on: Option<String>,
}

impl LedgerState {
    fn check_failure(&self, migration: &Migration) -> Result<(), Error> {
        if self.fail_on.as_deref() == Some(migration.version.as_str()) {
            return Err(Error::Generic(format!(
                "induced failure for migration {}",
                migration.version
            )));
        }
        Ok(())
    }
}

/// An in-memory [`MigrationLedger`] that counts which execution paths were
/// taken.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given versions already recorded as applied.
    pub fn with_applied<'a>(versions: impl IntoIterator<Item = &'a str>) -> Self {
        let ledger = Self::default();
        {
            let mut state = ledger.state.borrow_mut();
            for version in versions {
                state.applied.insert(version.to_string());
            }
        }
        ledger
    }

    /// Make any apply/revert of the given version fail.
    pub fn failing_on(self, version: &str) -> Self {
        self.state.borrow_mut().fail_on = Some(version.to_string());
        self
    }

    /// A shared handle onto the backing state for assertions.
    pub fn state(&self) -> Rc<RefCell<LedgerState>> {
        Rc::clone(&self.state)
    }
}

impl MigrationLedger for MemoryLedger {
    fn list(&mut self) -> Result<HashMap<String, Migration>, Error> {
        let state = self.state.borrow();
        let mut migrations = HashMap::new();
        for version in &state.applied {
            let mut migration = Migration::new(version.clone(), "");
            migration.applied = true;
            migrations.insert(version.clone(), migration);
        }
        Ok(migrations)
    }

    fn is_applied(&mut self, version: &str) -> Result<bool, Error> {
        Ok(self.state.borrow().applied.contains(version))
    }

    fn apply(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.check_failure(migration)?;
        state.plain_applies += 1;
        state.executed_scripts.push(script.to_string());
        state.applied.insert(migration.version.clone());
        Ok(())
    }

    fn apply_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.check_failure(migration)?;
        state.tx_applies += 1;
        state.executed_scripts.push(script.to_string());
        state.applied.insert(migration.version.clone());
        Ok(())
    }

    fn revert(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.check_failure(migration)?;
        state.plain_reverts += 1;
        state.executed_scripts.push(script.to_string());
        state.applied.remove(&migration.version);
        state.reverted_order.push(migration.version.clone());
        Ok(())
    }

    fn revert_with_tx(&mut self, script: &str, migration: &Migration) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.check_failure(migration)?;
        state.tx_reverts += 1;
        state.executed_scripts.push(script.to_string());
        state.applied.remove(&migration.version);
        state.reverted_order.push(migration.version.clone());
        Ok(())
    }
}

/// A [`Reporter`] that discards every message.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _message: &str) {}
}

/// A [`Reporter`] that records every message for assertions.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    messages: Rc<RefCell<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared handle onto the recorded messages.
    pub fn messages(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.messages)
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
