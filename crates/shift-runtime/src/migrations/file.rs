//! Migration file naming: `<version>_<name>.<up|down>.sql`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use shift_core::error::ShiftError;

static MIGRATION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)_([A-Za-z0-9_]+)\.(up|down)\.sql$")
        .expect("migration filename pattern is valid")
});

/// Whether a script moves the schema forward or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(ShiftError::Ledger(format!(
                "Unknown migration direction '{}'",
                other
            ))),
        }
    }
}

/// A candidate migration script found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Leading digit run of the filename. Zero when invalid.
    pub version: i64,
    /// `None` when invalid.
    pub direction: Option<Direction>,
    /// Description between the version and the direction suffix.
    pub name: String,
    /// Location of the SQL text.
    pub path: PathBuf,
    /// Whether the filename matched `<digits>_<name>.<up|down>.sql`.
    pub valid: bool,
}

impl MigrationFile {
    /// Parse migration metadata from a path's file name.
    ///
    /// Never fails: anything that does not match the naming pattern, or
    /// whose version is zero or does not fit in an `i64`, is marked invalid.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_file_name);

        match parsed {
            Some((version, name, direction)) => Self {
                version,
                direction: Some(direction),
                name,
                path,
                valid: true,
            },
            None => Self::invalid(path),
        }
    }

    fn invalid(path: PathBuf) -> Self {
        Self {
            version: 0,
            direction: None,
            name: String::new(),
            path,
            valid: false,
        }
    }

    /// File name for log lines.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    pub fn is_up(&self) -> bool {
        self.valid && self.direction == Some(Direction::Up)
    }
}

fn parse_file_name(file_name: &str) -> Option<(i64, String, Direction)> {
    let caps = MIGRATION_FILENAME.captures(file_name)?;

    let version = caps[1].parse::<i64>().ok().filter(|v| *v > 0)?;
    let direction = caps[3].parse::<Direction>().ok()?;

    Some((version, caps[2].to_string(), direction))
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up_migration() {
        let file = MigrationFile::from_path("/srv/migrations/1_init.up.sql");
        assert!(file.valid);
        assert_eq!(file.version, 1);
        assert_eq!(file.direction, Some(Direction::Up));
        assert_eq!(file.name, "init");
        assert!(file.is_up());
    }

    #[test]
    fn test_parse_down_migration() {
        let file = MigrationFile::from_path("3_add_orders.down.sql");
        assert!(file.valid);
        assert_eq!(file.version, 3);
        assert_eq!(file.direction, Some(Direction::Down));
        assert!(!file.is_up());
    }

    #[test]
    fn test_version_is_whole_digit_run() {
        let file = MigrationFile::from_path("20240131_seed_users.up.sql");
        assert_eq!(file.version, 20240131);

        let padded = MigrationFile::from_path("0012_create_index.up.sql");
        assert_eq!(padded.version, 12);
    }

    #[test]
    fn test_invalid_filenames() {
        for name in [
            "abc.sql",
            "init.up.sql",
            "_init.up.sql",
            "1_.up.sql",
            "1_init.sql",
            "1_init.sideways.sql",
            "1_init.up.sql.bak",
            "1-init.up.sql",
            "1_in-it.up.sql",
            "1_init.UP.sql",
            "1_café.up.sql",
            "1_名前.up.sql",
            "١_init.up.sql",
            "README.md",
        ] {
            let file = MigrationFile::from_path(name);
            assert!(!file.valid, "{} should be invalid", name);
            assert_eq!(file.version, 0);
            assert_eq!(file.direction, None);
        }
    }

    #[test]
    fn test_zero_version_is_invalid() {
        assert!(!MigrationFile::from_path("0_bootstrap.up.sql").valid);
        assert!(!MigrationFile::from_path("000_bootstrap.up.sql").valid);
    }

    #[test]
    fn test_overflowing_version_is_invalid() {
        let file = MigrationFile::from_path("99999999999999999999999_huge.up.sql");
        assert!(!file.valid);
    }

    #[test]
    fn test_direction_round_trip_text() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!(Direction::Down.to_string(), "down");
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(ShiftError::Ledger(_))
        ));
    }
}
