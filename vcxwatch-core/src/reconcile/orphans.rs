//! Scan for watched files that no descriptor references

use super::paths::{NormalizedPath, ReferenceSet};
use crate::monitor::{ChangeType, Classification, EventFilter, Relevance, WatchedEvent};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files under `roots` that the filter would watch but `referenced` does not list.
///
/// Report only; nothing is deleted. Sorted by normalized path.
pub fn find_orphans(
    roots: &[PathBuf],
    filter: &EventFilter,
    referenced: &ReferenceSet,
) -> Vec<PathBuf> {
    let mut orphans = BTreeMap::new();

    for root in roots {
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let probe = WatchedEvent::new(ChangeType::Created, &path);
            if filter.classify(&probe) != Classification::Relevant(Relevance::Source) {
                continue;
            }

            let key = NormalizedPath::new(&path);
            if !referenced.contains_key(&key) {
                orphans.entry(key).or_insert(path);
            }
        }
    }

    debug!("Found {} unreferenced files", orphans.len());
    orphans.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorConfig;
    use tempfile::TempDir;

    #[test]
    fn test_lists_unreferenced_watched_files() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Source");
        std::fs::create_dir_all(source.join("Game")).unwrap();
        std::fs::create_dir_all(source.join("Intermediate")).unwrap();
        let files =
            ["Game/A.cpp", "Game/B.h", "Game/notes.txt", "Game/C.cpp.tmp", "Intermediate/Gen.cpp"];
        for rel in files {
            std::fs::write(source.join(rel), "").unwrap();
        }

        let filter = EventFilter::new(&MonitorConfig {
            ignored_name_patterns: vec![".tmp".to_string()],
            ignored_dirs: vec!["/intermediate/".to_string()],
            ..Default::default()
        });
        let referenced: ReferenceSet = [source.join("Game/A.cpp")].into_iter().collect();

        // Overlapping roots must not report a file twice
        let roots = vec![source.clone(), source.join("Game")];
        let orphans = find_orphans(&roots, &filter, &referenced);

        assert_eq!(orphans, vec![source.join("Game/B.h")]);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let filter = EventFilter::new(&MonitorConfig::default());
        let roots = [PathBuf::from("/nonexistent/root")];
        let orphans = find_orphans(&roots, &filter, &ReferenceSet::new());
        assert!(orphans.is_empty());
    }
}
