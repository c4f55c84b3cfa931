// Instrument icon cache
// Maps an instrument type tag to an image file found under an icon directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Image extensions accepted as icons
const ICON_EXTENSIONS: &[&str] = &["png", "svg", "jpg", "jpeg"];

/// Opaque handle to a resolved icon image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconHandle {
    pub type_tag: String,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct IconCache {
    icons: HashMap<String, IconHandle>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_tag: &str, path: impl Into<PathBuf>) {
        self.icons.insert(
            type_tag.to_string(),
            IconHandle {
                type_tag: type_tag.to_string(),
                path: path.into(),
            },
        );
    }

    /// Build a cache from every image file below `dir`, keyed by file stem
    ///
    /// When two files share a stem the first one found wins.
    pub fn scan_dir(dir: &Path) -> Result<Self, walkdir::Error> {
        let mut cache = Self::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| ICON_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_image && !cache.icons.contains_key(stem) {
                cache.insert(stem, path);
            }
        }
        log::debug!("Found {} instrument icons in {}", cache.len(), dir.display());
        Ok(cache)
    }

    pub fn lookup(&self, type_tag: &str) -> Option<&IconHandle> {
        self.icons.get(type_tag)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_finds_images_by_stem() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("guitar.png"), b"png").unwrap();
        std::fs::write(dir.path().join("sub").join("voice.SVG"), b"svg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let cache = IconCache::scan_dir(dir.path()).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("guitar").is_some());
        assert!(cache.lookup("voice").is_some());
        assert!(cache.lookup("notes").is_none());
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let dir = tempdir().unwrap();
        assert!(IconCache::scan_dir(&dir.path().join("absent")).is_err());
    }
}
