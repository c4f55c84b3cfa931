// Project format versions and legacy-file preservation

use crate::project::ProjectError;
use std::fmt;
use std::path::{Path, PathBuf};

/// A project file format version this crate can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Earliest format: positional fade points, no effects, no history
    V0_1,
    /// Adds global effects, dictionary-encoded fades, recording state
    V0_2,
    /// Adds persisted undo/redo history and graveyards
    V0_9,
}

/// Exact version strings; there is no fuzzy or partial matching
const VERSION_TABLE: &[(&str, FormatVersion)] = &[
    ("0.1", FormatVersion::V0_1),
    ("0.2", FormatVersion::V0_2),
    ("0.9", FormatVersion::V0_9),
];

impl FormatVersion {
    /// Version written by this crate
    pub const CURRENT: FormatVersion = FormatVersion::V0_9;

    pub fn from_tag(tag: &str) -> Option<Self> {
        VERSION_TABLE
            .iter()
            .find(|(known, _)| *known == tag)
            .map(|(_, version)| *version)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormatVersion::V0_1 => "0.1",
            FormatVersion::V0_2 => "0.2",
            FormatVersion::V0_9 => "0.9",
        }
    }

    pub fn is_current(self) -> bool {
        self == Self::CURRENT
    }

    /// Every readable version, oldest first
    pub fn all() -> impl Iterator<Item = FormatVersion> {
        VERSION_TABLE.iter().map(|(_, version)| *version)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the copy kept when a legacy file is opened:
/// `<dir>/<stem>.<version>.jokosher`
pub fn backup_path(path: &Path, version: FormatVersion) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.jokosher", stem, version))
}

/// Copy a legacy project file aside before anything can overwrite it
///
/// An existing backup is left untouched, so the first copy of the
/// original always survives.
pub fn create_backup(path: &Path, version: FormatVersion) -> Result<PathBuf, ProjectError> {
    let backup = backup_path(path, version);
    if backup.exists() {
        log::debug!("Backup {} already present", backup.display());
        return Ok(backup);
    }

    std::fs::copy(path, &backup).map_err(|source| ProjectError::IoFailure {
        path: backup.clone(),
        source,
    })?;
    log::info!(
        "Version {} project backed up to {}",
        version,
        backup.display()
    );
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_exact_version_mapping() {
        assert_eq!(FormatVersion::from_tag("0.1"), Some(FormatVersion::V0_1));
        assert_eq!(FormatVersion::from_tag("0.9"), Some(FormatVersion::V0_9));
        for tag in ["7.7", "0.9.0", " 0.9", "0", ""] {
            assert_eq!(FormatVersion::from_tag(tag), None, "{:?}", tag);
        }
        assert!(FormatVersion::CURRENT.is_current());
        assert_eq!(FormatVersion::all().count(), 3);
    }

    #[test]
    fn test_backup_name() {
        assert_eq!(
            backup_path(Path::new("/s/Demo.jokosher"), FormatVersion::V0_2),
            PathBuf::from("/s/Demo.0.2.jokosher")
        );
    }

    #[test]
    fn test_backup_keeps_first_copy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Old.jokosher");
        std::fs::write(&path, b"original").unwrap();

        let backup = create_backup(&path, FormatVersion::V0_1).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"original");

        std::fs::write(&path, b"rewritten").unwrap();
        create_backup(&path, FormatVersion::V0_1).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"original");
    }
}
