//! Configuration loading for the `stratum` binary.
//!
//! Settings come from a `stratum.toml` file found in the current directory
//! or the nearest ancestor directory, with `STRATUM_*` environment variables
//! taking precedence over file values. Everything has a default, so running
//! without a config file is fine as long as the environment fills in the
//! database connection.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "stratum.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub version_style: String,
    pub filesystem: FilesystemSourceConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            version_style: "timestamp".to_string(),
            filesystem: FilesystemSourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilesystemSourceConfig {
    pub directory_path: String,
}

impl Default for FilesystemSourceConfig {
    fn default() -> Self {
        Self {
            directory_path: "migrations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub driver: String,
    pub migrations_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            driver: String::new(),
            migrations_table: "stratum_migrations".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the nearest `stratum.toml` (if any) and the
    /// environment.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let cwd = env::current_dir()?;
        let mut config = match find_config_file(&cwd) {
            Some(path) => {
                let text = fs::read_to_string(&path)?;
                toml::from_str(&text)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML text, without touching the environment.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env_overrides(&mut self) {
        override_from_env("STRATUM_SOURCE_VERSION_STYLE", &mut self.source.version_style);
        override_from_env(
            "STRATUM_SOURCE_FS_DIR_PATH",
            &mut self.source.filesystem.directory_path,
        );
        override_from_env("STRATUM_DB_HOST", &mut self.database.host);
        override_from_env("STRATUM_DB_PORT", &mut self.database.port);
        override_from_env("STRATUM_DB_USER", &mut self.database.user);
        override_from_env("STRATUM_DB_PASSWORD", &mut self.database.password);
        override_from_env("STRATUM_DB_NAME", &mut self.database.dbname);
        override_from_env("STRATUM_DB_DRIVER", &mut self.database.driver);
        override_from_env(
            "STRATUM_DB_MIGRATIONS_TABLE",
            &mut self.database.migrations_table,
        );
    }
}

fn override_from_env(name: &str, slot: &mut String) {
    if let Ok(value) = env::var(name) {
        *slot = value;
    }
}

/// Walk up from `start` looking for the config file.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.source.version_style, "timestamp");
        assert_eq!(config.source.filesystem.directory_path, "migrations");
        assert_eq!(config.database.migrations_table, "stratum_migrations");
        assert_eq!(config.database.driver, "");
    }

    #[test]
    fn file_values_override_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            version_style = "sequential"

            [source.filesystem]
            directory_path = "db/migrations"

            [database]
            host = "localhost"
            port = "5432"
            user = "app"
            password = "secret"
            dbname = "app_db"
            driver = "postgresql"
            migrations_table = "schema_changes"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.version_style, "sequential");
        assert_eq!(config.source.filesystem.directory_path, "db/migrations");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.driver, "postgresql");
        assert_eq!(config.database.migrations_table, "schema_changes");
    }

    #[test]
    fn unknown_toml_is_ignored_gracefully() {
        // Unrelated tables don't break loading.
        let config = Config::from_toml("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_file_is_found_in_an_ancestor_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn missing_config_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(dir.path()).is_none());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::from_toml("[database]\nhost = \"from-file\"\n").unwrap();
        // Scoped to a variable name no other test uses.
        env::set_var("STRATUM_DB_HOST", "from-env");
        config.apply_env_overrides();
        env::remove_var("STRATUM_DB_HOST");

        assert_eq!(config.database.host, "from-env");
    }
}
