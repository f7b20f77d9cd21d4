//! Path normalization and reference sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Absolute, lexically cleaned, `/`-separated, case-folded form of a path.
///
/// Every set comparison in the reconciler goes through this type; raw paths
/// are never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_absolute(&absolutize(path.as_ref()))
    }

    fn from_absolute(path: &Path) -> Self {
        Self(path.to_string_lossy().replace('\\', "/").to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring match against an already-normalized fragment such as `/intermediate/`
    pub fn contains(&self, fragment: &str) -> bool {
        self.0.contains(fragment)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Make a path absolute against the current directory and resolve `.` and
/// `..` components without touching the filesystem.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Set of files a project descriptor references.
///
/// Keyed by [`NormalizedPath`]; each entry keeps the absolute path it was
/// inserted with so that filesystem operations use the real spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    entries: BTreeMap<NormalizedPath, PathBuf>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path. Returns false if an equivalent path was already present.
    pub fn insert(&mut self, path: impl AsRef<Path>) -> bool {
        let absolute = absolutize(path.as_ref());
        let key = NormalizedPath::from_absolute(&absolute);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, absolute);
        true
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(&NormalizedPath::new(path))
    }

    pub fn contains_key(&self, key: &NormalizedPath) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths in `self` that are not in `other`, in normalized order
    pub fn difference(&self, other: &ReferenceSet) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|(key, _)| !other.entries.contains_key(*key))
            .map(|(_, path)| path.clone())
            .collect()
    }

    pub fn extend_from(&mut self, other: ReferenceSet) {
        for (key, path) in other.entries {
            self.entries.entry(key).or_insert(path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedPath, &Path)> {
        self.entries.iter().map(|(key, path)| (key, path.as_path()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.values().map(PathBuf::as_path)
    }
}

impl<P: AsRef<Path>> FromIterator<P> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut set = ReferenceSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_normalization_folds_case_and_dots() {
        let a = NormalizedPath::new("/Proj/Source/./Game/../Game/Actor.CPP");
        let b = NormalizedPath::new("/proj/source/game/actor.cpp");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/proj/source/game/actor.cpp");
    }

    #[cfg(windows)]
    #[test]
    fn test_normalization_folds_case_and_separators() {
        let a = NormalizedPath::new(r"C:\Proj\Source\Game\..\Game\Actor.CPP");
        let b = NormalizedPath::new("c:/proj/source/game/actor.cpp");
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let normalized = NormalizedPath::new("some/file.cpp");
        assert!(Path::new(normalized.as_str()).is_absolute() || normalized.as_str().contains(':'));
        assert!(normalized.as_str().ends_with("some/file.cpp"));
    }

    #[cfg(unix)]
    #[test]
    fn test_reference_set_difference_keeps_original_spelling() {
        let cached: ReferenceSet =
            ["/proj/Source/A.cpp", "/proj/Source/B.cpp"].into_iter().collect();
        let current: ReferenceSet = ["/PROJ/source/a.cpp"].into_iter().collect();

        let removed = cached.difference(&current);
        assert_eq!(removed, vec![PathBuf::from("/proj/Source/B.cpp")]);
        assert!(current.difference(&cached).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_insert_deduplicates_equivalent_paths() {
        let mut set = ReferenceSet::new();
        assert!(set.insert("/proj/a.cpp"));
        assert!(!set.insert("/PROJ/./A.cpp"));
        assert_eq!(set.len(), 1);
        assert!(set.contains("/proj/x/../a.cpp"));
    }
}
