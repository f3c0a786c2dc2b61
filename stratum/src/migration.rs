use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Error;

/// Layout of a timestamp-style version string, e.g. `20240131094500`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One versioned, named unit of schema change.
///
/// The `version` string is the only stable identity of a migration: it keys
/// the ledger row in the database and the script file on disk. The `applied`
/// flag is derived by cross-referencing the ledger at read time and is never
/// persisted on the entity itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: String,
    pub message: String,
    pub applied: bool,
}

impl Migration {
    /// Create an unapplied migration with the given version and message.
    pub fn new(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            message: message.into(),
            applied: false,
        }
    }

    /// Create a sequential-style migration. The version is zero-padded to
    /// three digits for file-name aesthetics; comparison is always numeric.
    pub fn sequential(version: u64, message: impl Into<String>) -> Self {
        Self::new(format!("{version:03}"), message)
    }

    /// Create a timestamp-style migration stamped with the given instant.
    pub fn timestamp(at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(at.format(TIMESTAMP_FORMAT).to_string(), message)
    }

    /// The message lowercased, trimmed, and with spaces replaced by
    /// underscores, suitable for use in a file name.
    pub fn normalized_message(&self) -> String {
        self.message.to_lowercase().trim().replace(' ', "_")
    }

    /// The `<version>_<normalized message>` name used for the migration's
    /// script file and in progress output.
    pub fn name(&self) -> String {
        format!("{}_{}", self.version, self.normalized_message())
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checked = if self.applied { "x" } else { " " };
        write!(
            f,
            "{} - {} - [{}]",
            self.version,
            self.normalized_message(),
            checked
        )
    }
}

/// The scheme used to generate and order migration versions.
///
/// All ordering and comparison dispatches on the configured style; comparing
/// versions across styles is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionStyle {
    /// Base-10 integer versions: `001`, `002`, ... Next version is one more
    /// than the numeric maximum of the existing set.
    Sequential,
    /// 14-digit `YYYYMMDDHHMMSS` versions stamped at creation time.
    #[default]
    Timestamp,
}

impl VersionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStyle::Sequential => "sequential",
            VersionStyle::Timestamp => "timestamp",
        }
    }

    /// Parse a version string into an orderable key for this style.
    pub(crate) fn sort_key(&self, version: &str) -> Result<VersionKey, Error> {
        match self {
            VersionStyle::Sequential => version
                .parse::<u64>()
                .map(VersionKey::Sequential)
                .map_err(|e| Error::MalformedVersion {
                    version: version.to_string(),
                    reason: e.to_string(),
                }),
            VersionStyle::Timestamp => NaiveDateTime::parse_from_str(version, TIMESTAMP_FORMAT)
                .map(VersionKey::Timestamp)
                .map_err(|e| Error::MalformedVersion {
                    version: version.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

impl FromStr for VersionStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(VersionStyle::Sequential),
            "timestamp" => Ok(VersionStyle::Timestamp),
            other => Err(Error::InvalidVersionStyle {
                style: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for VersionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orderable form of a version string. Within one run every key comes from
/// the same style, so cross-variant comparison never happens in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum VersionKey {
    Sequential(u64),
    Timestamp(NaiveDateTime),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_message_lowercases_and_underscores() {
        let m = Migration::new("001", "  Create Users Table ");
        assert_eq!(m.normalized_message(), "create_users_table");
        assert_eq!(m.name(), "001_create_users_table");
    }

    #[test]
    fn display_marks_applied_state() {
        let mut m = Migration::new("002", "add index");
        assert_eq!(m.to_string(), "002 - add_index - [ ]");
        m.applied = true;
        assert_eq!(m.to_string(), "002 - add_index - [x]");
    }

    #[test]
    fn sequential_constructor_zero_pads() {
        assert_eq!(Migration::sequential(4, "m").version, "004");
        assert_eq!(Migration::sequential(1000, "m").version, "1000");
    }

    #[test]
    fn sequential_keys_compare_numerically() {
        let style = VersionStyle::Sequential;
        let mut versions = vec!["20000", "10000", "1010", "1009", "190", "110", "001"];
        versions.sort_by_key(|v| style.sort_key(v).unwrap());
        assert_eq!(
            versions,
            vec!["001", "110", "190", "1009", "1010", "10000", "20000"]
        );
    }

    #[test]
    fn timestamp_keys_compare_chronologically() {
        let style = VersionStyle::Timestamp;
        let earlier = style.sort_key("20060102150405").unwrap();
        let later = style.sort_key("20070102150405").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn malformed_versions_are_rejected() {
        assert!(matches!(
            VersionStyle::Sequential.sort_key("abc"),
            Err(Error::MalformedVersion { .. })
        ));
        // Month 13 is not a valid calendar instant even though it is numeric.
        assert!(matches!(
            VersionStyle::Timestamp.sort_key("20061302150405"),
            Err(Error::MalformedVersion { .. })
        ));
    }

    #[test]
    fn version_style_parses_from_configuration_strings() {
        assert_eq!(
            "sequential".parse::<VersionStyle>().unwrap(),
            VersionStyle::Sequential
        );
        assert_eq!(
            "timestamp".parse::<VersionStyle>().unwrap(),
            VersionStyle::Timestamp
        );
        assert!(matches!(
            "semver".parse::<VersionStyle>(),
            Err(Error::InvalidVersionStyle { .. })
        ));
    }
}
