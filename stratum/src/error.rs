/// Error type for the stratum crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{name} is an invalid migration name: expected a \
         migration file of the format <version>_<message>"
    )]
    MalformedName { name: String },
    #[error("unable to parse migration version {version}: {reason}")]
    MalformedVersion { version: String, reason: String },
    #[error("unable to sort migrations: [{}]", format_errors(.0))]
    Sort(Vec<Error>),
    #[error("migration with version {version} does not exist")]
    VersionNotFound { version: String },
    #[error("migration with version {version} is already applied, nothing to apply")]
    AlreadyApplied { version: String },
    #[error("migration with version {version} isn't applied, nothing to revert")]
    NotApplied { version: String },
    #[error(
        "invalid migration table name {name}: a migration table name must only \
         contain alphanumeric or underscore characters and optionally a single \
         dot for schema-qualified names"
    )]
    InvalidTableName { name: String },
    #[error("invalid version style {style}: supported styles are sequential and timestamp")]
    InvalidVersionStyle { style: String },
    #[error("unsupported driver {driver}: supported drivers are sqlite, mysql, postgresql")]
    UnsupportedDriver { driver: String },
    #[error("unable to apply migration {name}: {source}")]
    Apply {
        name: String,
        #[source]
        source: Box<Error>,
    },
    #[error("unable to revert migration {name}: {source}")]
    Revert {
        name: String,
        #[source]
        source: Box<Error>,
    },
    #[error("{0}")]
    Generic(String),
}

fn format_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}
