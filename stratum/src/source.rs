//! Where migrations live locally.
//!
//! A [`MigrationSource`] enumerates the known migrations, persists newly
//! created ones, and hands back raw script text for parsing. The production
//! implementation is [`FsSource`], a directory of `<version>_<message>.sql`
//! files.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::migration::Migration;

/// Skeleton written into a newly created migration file.
pub const SCRIPT_TEMPLATE: &str = "-- migrate:up\n\n-- migrate:down\n";

/// Lists, creates, and reads migrations from some backing store.
pub trait MigrationSource {
    /// Persist a new migration artifact for the given migration.
    fn create(&self, migration: &Migration) -> Result<(), Error>;

    /// Enumerate all known local migrations, keyed by version. Surfaces a
    /// descriptive error if a discovered artifact's name cannot be
    /// decomposed into `<version>_<message>`.
    fn list(&self) -> Result<HashMap<String, Migration>, Error>;

    /// The highest-ordered known migration by discovery order, or `None`
    /// when the store is empty. Kept as a fallback input for sequential
    /// version assignment; callers should prefer the numeric maximum over
    /// [`list`](Self::list).
    fn latest(&self) -> Result<Option<Migration>, Error>;

    /// The migration's full file content, for the parser to split.
    fn read_upgrade_script(&self, migration: &Migration) -> Result<String, Error>;

    /// Same file content as the upgrade read; the parser selects the
    /// downgrade section.
    fn read_downgrade_script(&self, migration: &Migration) -> Result<String, Error>;
}

/// A directory of `<version>_<message>.sql` migration files.
pub struct FsSource {
    dir: PathBuf,
}

impl FsSource {
    /// Open a migration directory, creating it when missing. Errors when the
    /// path exists but is not a directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(Error::Generic(format!(
                "the migrations directory path {} is not a directory",
                dir.display()
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&dir).map_err(|e| Error::Io {
                    context: format!(
                        "unable to create migration directory at {}",
                        dir.display()
                    ),
                    source: e,
                })?;
                Ok(Self { dir })
            }
            Err(e) => Err(Error::Io {
                context: format!(
                    "unable to check if migration directory at {} exists",
                    dir.display()
                ),
                source: e,
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn script_path(&self, migration: &Migration) -> PathBuf {
        self.dir.join(format!("{}.sql", migration.name()))
    }

    fn read_script(&self, migration: &Migration) -> Result<String, Error> {
        let path = self.script_path(migration);
        fs::read_to_string(&path).map_err(|e| Error::Io {
            context: format!("unable to read {} script", path.display()),
            source: e,
        })
    }
}

impl MigrationSource for FsSource {
    fn create(&self, migration: &Migration) -> Result<(), Error> {
        let path = self.script_path(migration);
        fs::write(&path, SCRIPT_TEMPLATE).map_err(|e| Error::Io {
            context: format!("unable to create file at {}", path.display()),
            source: e,
        })
    }

    fn list(&self) -> Result<HashMap<String, Migration>, Error> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::Io {
            context: format!(
                "unable to read migration directory at {}",
                self.dir.display()
            ),
            source: e,
        })?;

        let mut migrations = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Io {
                context: format!(
                    "unable to read migration directory at {}",
                    self.dir.display()
                ),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let migration = migration_from_file_name(&name)?;
            migrations.insert(migration.version.clone(), migration);
        }

        Ok(migrations)
    }

    fn latest(&self) -> Result<Option<Migration>, Error> {
        let mut migrations: Vec<Migration> = self.list()?.into_values().collect();
        migrations.sort_by(|a, b| a.name().cmp(&b.name()));
        Ok(migrations.pop())
    }

    fn read_upgrade_script(&self, migration: &Migration) -> Result<String, Error> {
        self.read_script(migration)
    }

    fn read_downgrade_script(&self, migration: &Migration) -> Result<String, Error> {
        self.read_script(migration)
    }
}

fn migration_from_file_name(name: &str) -> Result<Migration, Error> {
    let Some((version, message)) = name.split_once('_') else {
        return Err(Error::MalformedName {
            name: name.to_string(),
        });
    };
    // Strip the final extension, if any, from the message part.
    let message = match message.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => message,
    };
    Ok(Migration::new(version, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_decompose_into_version_and_message() {
        let m = migration_from_file_name("001_create_users.sql").unwrap();
        assert_eq!(m.version, "001");
        assert_eq!(m.message, "create_users");
        assert!(!m.applied);

        let m = migration_from_file_name("20240131094500_add_index.sql").unwrap();
        assert_eq!(m.version, "20240131094500");
        assert_eq!(m.message, "add_index");
    }

    #[test]
    fn file_names_without_a_separator_are_rejected() {
        assert!(matches!(
            migration_from_file_name("notamigration.sql"),
            Err(Error::MalformedName { .. })
        ));
    }

    #[test]
    fn create_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSource::new(dir.path().join("migrations")).unwrap();

        let migration = Migration::new("001", "create users");
        source.create(&migration).unwrap();

        let listed = source.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["001"].message, "create_users");

        let contents = source.read_upgrade_script(&migration).unwrap();
        assert_eq!(contents, SCRIPT_TEMPLATE);
        assert_eq!(
            source.read_downgrade_script(&migration).unwrap(),
            SCRIPT_TEMPLATE
        );
    }

    #[test]
    fn list_rejects_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSource::new(dir.path()).unwrap();
        fs::write(dir.path().join("garbage.sql"), "SELECT 1;").unwrap();

        assert!(matches!(
            source.list(),
            Err(Error::MalformedName { .. })
        ));
    }

    #[test]
    fn latest_returns_highest_by_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSource::new(dir.path()).unwrap();
        for version in ["001", "002", "003"] {
            source.create(&Migration::new(version, "step")).unwrap();
        }

        let latest = source.latest().unwrap().unwrap();
        assert_eq!(latest.version, "003");
    }

    #[test]
    fn latest_is_none_for_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSource::new(dir.path()).unwrap();
        assert!(source.latest().unwrap().is_none());
    }

    #[test]
    fn new_rejects_a_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("migrations");
        fs::write(&file, "not a directory").unwrap();

        assert!(FsSource::new(&file).is_err());
    }

    #[test]
    fn new_creates_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("migrations");
        let source = FsSource::new(&path).unwrap();
        assert!(source.dir().is_dir());
    }
}
