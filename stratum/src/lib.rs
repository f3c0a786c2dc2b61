#![cfg_attr(docsrs, feature(doc_cfg))]
//! `stratum` is a lightweight engine for managing database schema migrations
//! driven by plain SQL scripts.
//!
//! Core concepts:
//! - Migrations are versioned `.sql` files in a directory, each holding an
//!   upgrade section and a downgrade section split by `-- migrate:up` /
//!   `-- migrate:down` directive lines.
//! - Which versions have been applied is tracked in a ledger table inside
//!   the target database itself; a migration is outstanding exactly when it
//!   exists locally but has no ledger row.
//! - Versions are either `sequential` integers or `YYYYMMDDHHMMSS`
//!   timestamps, and the engine always applies in ascending and reverts in
//!   descending version order.
//!
//! # Transaction safety
//!
//! By default each migration's script execution and its ledger write run in
//! one database transaction that rolls back together on failure. A script
//! can opt out per direction with `-- migrate:up transaction:false`, in
//! which case the two steps run independently and a failure can leave
//! partial state. Sequences across migrations are always fail-fast:
//! migrations applied before a failure stay applied.
//!
//! # Example
//!
//! ```no_run
//! use stratum::{
//!     ConsoleReporter, FsSource, Migrator, SortOrder, SqliteLedger, VersionStyle,
//! };
//!
//! # fn main() -> Result<(), stratum::Error> {
//! let source = FsSource::new("migrations")?;
//! let ledger = SqliteLedger::open("app.db", "stratum_migrations")?;
//! let mut migrator = Migrator::new(
//!     Box::new(source),
//!     Box::new(ledger),
//!     VersionStyle::Sequential,
//!     Box::new(ConsoleReporter),
//! );
//!
//! migrator.create("create users table")?;
//! migrator.apply_all()?;
//! for migration in migrator.list(SortOrder::Asc)? {
//!     println!("{migration}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Database support
//!
//! - `SQLite` - available with the `sqlite` feature flag (default).
//! - `MySQL` - available with the `mysql` feature flag.
//! - `PostgreSQL` - available with the `postgres` feature flag.
//!
//! Tracing integration is available with the `tracing` feature flag, and
//! in-memory fakes for testing with the `testing` feature flag.

mod error;
pub use error::Error;

mod migration;
pub use migration::{Migration, VersionStyle, TIMESTAMP_FORMAT};

pub mod sqlparse;

mod source;
pub use source::{FsSource, MigrationSource, SCRIPT_TEMPLATE};

mod ledger;
pub use ledger::{sanitize_table_name, MigrationLedger};

mod dialect;
pub use dialect::{ConnectionConfig, Dialect};

mod report;
pub use report::{ConsoleReporter, Reporter};

mod runner;
pub use runner::{Migrator, SortOrder};

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteLedger;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "mysql")]
pub use self::mysql::MysqlLedger;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresLedger;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
