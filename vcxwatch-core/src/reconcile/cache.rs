//! Durable storage of the last committed reference set

use super::paths::ReferenceSet;
use super::{ReconcileError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// JSON file holding a flat, ordered list of referenced paths.
///
/// Loading never fails: a missing or corrupt cache is an empty set.
#[derive(Debug, Clone)]
pub struct ReferenceCache {
    path: PathBuf,
}

impl ReferenceCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ReferenceSet {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No reference cache at {}, starting empty", self.path.display());
                return ReferenceSet::new();
            }
            Err(e) => {
                warn!(
                    "Reference cache unreadable ({}), starting empty: {}",
                    e,
                    self.path.display()
                );
                return ReferenceSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(paths) => {
                let set: ReferenceSet = paths.into_iter().collect();
                debug!("Loaded {} cached references from {}", set.len(), self.path.display());
                set
            }
            Err(e) => {
                warn!(
                    "Reference cache is corrupt ({}), starting empty: {}",
                    e,
                    self.path.display()
                );
                ReferenceSet::new()
            }
        }
    }

    /// Replace the cache file atomically (temp file in the same directory, then rename)
    pub fn save(&self, set: &ReferenceSet) -> Result<()> {
        let paths: Vec<String> = set.paths().map(|p| p.to_string_lossy().into_owned()).collect();
        let json = serde_json::to_string_pretty(&paths)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let write_err = |source| ReconcileError::CacheWrite { path: self.path.clone(), source };

        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut file = NamedTempFile::new_in(&dir).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Saved {} references to {}", set.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = ReferenceCache::new(dir.path().join("state").join("cache.json"));
        let set: ReferenceSet =
            [dir.path().join("b.cpp"), dir.path().join("a.cpp")].into_iter().collect();

        cache.save(&set).unwrap();

        assert_eq!(cache.load(), set);
    }

    #[test]
    fn test_saved_list_is_ordered() {
        let dir = TempDir::new().unwrap();
        let cache = ReferenceCache::new(dir.path().join("cache.json"));
        let set: ReferenceSet =
            [dir.path().join("z.cpp"), dir.path().join("a.cpp")].into_iter().collect();

        cache.save(&set).unwrap();

        let stored: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].ends_with("a.cpp"));
        assert!(stored[1].ends_with("z.cpp"));
    }

    #[test]
    fn test_missing_and_corrupt_cache_load_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ReferenceCache::new(dir.path().join("cache.json"));
        assert!(cache.load().is_empty());

        std::fs::write(cache.path(), "{ not json").unwrap();
        assert!(cache.load().is_empty());

        std::fs::write(cache.path(), r#"{"files": []}"#).unwrap();
        assert!(cache.load().is_empty());
    }
}
