//! SQL dialect selection.
//!
//! The supported dialects form a small closed set chosen by configuration.
//! [`Dialect::connect`] builds the dialect's connection from a
//! [`ConnectionConfig`] and returns the matching
//! [`MigrationLedger`](crate::ledger::MigrationLedger) behind a trait
//! object.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::ledger::MigrationLedger;

/// Connection parameters for the target database.
///
/// All fields are plain strings as they arrive from configuration. For
/// SQLite, `dbname` is the database file path and the network fields are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl ConnectionConfig {
    fn port_or(&self, default: u16) -> Result<u16, Error> {
        if self.port.is_empty() {
            return Ok(default);
        }
        self.port
            .parse::<u16>()
            .map_err(|_| Error::Generic(format!("invalid database port {}", self.port)))
    }
}

/// One supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgresql",
        }
    }

    /// Open a connection for this dialect and wrap it in its migration
    /// ledger, bound to the given ledger table name.
    ///
    /// Dialects whose feature is not compiled in are rejected with an
    /// [`Error::UnsupportedDriver`].
    pub fn connect(
        self,
        cfg: &ConnectionConfig,
        table: &str,
    ) -> Result<Box<dyn MigrationLedger>, Error> {
        match self {
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let ledger = crate::sqlite::SqliteLedger::open(&cfg.dbname, table)?;
                Ok(Box::new(ledger))
            }
            #[cfg(feature = "mysql")]
            Dialect::Mysql => {
                let opts = mysql::OptsBuilder::new()
                    .ip_or_hostname(Some(cfg.host.clone()))
                    .tcp_port(cfg.port_or(3306)?)
                    .user(Some(cfg.user.clone()))
                    .pass(Some(cfg.password.clone()))
                    .db_name(Some(cfg.dbname.clone()));
                let conn = mysql::Conn::new(opts)?;
                let ledger = crate::mysql::MysqlLedger::new(conn, table)?;
                Ok(Box::new(ledger))
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let client = postgres::Config::new()
                    .host(&cfg.host)
                    .port(cfg.port_or(5432)?)
                    .user(&cfg.user)
                    .password(&cfg.password)
                    .dbname(&cfg.dbname)
                    .connect(postgres::NoTls)?;
                let ledger = crate::postgres::PostgresLedger::new(client, table)?;
                Ok(Box::new(ledger))
            }
            // A dialect whose backend feature is not compiled in.
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedDriver {
                driver: other.as_str().to_string(),
            }),
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::Mysql),
            "postgresql" => Ok(Dialect::Postgres),
            other => Err(Error::UnsupportedDriver {
                driver: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
