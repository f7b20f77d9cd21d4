//! Reading the referenced-file set out of project descriptors

use super::paths::ReferenceSet;
use regex_utils::descriptor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Source of truth for "which files does the project reference".
///
/// An empty set means the descriptor could not be read or parsed. Callers
/// must never interpret it as "every file was removed".
pub trait ReferenceSetReader: Send + Sync {
    fn read(&self, descriptor: &Path) -> ReferenceSet;
}

/// Reads `ClCompile` / `ClInclude` items from `.vcxproj` and `.vcxproj.filters` files
#[derive(Debug, Default, Clone, Copy)]
pub struct VcxprojReader;

impl VcxprojReader {
    pub fn new() -> Self {
        Self
    }

    /// Parse descriptor text. `base_dir` is the directory `Include` values are relative to.
    pub fn parse(text: &str, base_dir: &Path) -> ReferenceSet {
        if !descriptor::is_complete_project(text) {
            return ReferenceSet::new();
        }

        descriptor::extract_items(text)
            .into_iter()
            .map(|item| base_dir.join(native_separators(&item.include)))
            .collect()
    }
}

impl ReferenceSetReader for VcxprojReader {
    fn read(&self, descriptor_path: &Path) -> ReferenceSet {
        let bytes = match std::fs::read(descriptor_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Project descriptor not readable: {} ({})", descriptor_path.display(), e);
                return ReferenceSet::new();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let base_dir = descriptor_path.parent().unwrap_or_else(|| Path::new("."));
        let files = Self::parse(&text, base_dir);

        if files.is_empty() {
            error!(
                "Failed to parse project descriptor or it lists no files: {}",
                descriptor_path.display()
            );
        } else {
            debug!("Parsed {} files from {}", files.len(), descriptor_path.display());
        }

        files
    }
}

/// Read every descriptor and union the results.
///
/// Returns `None` if any single descriptor yields nothing, so that a partially
/// written file never shrinks the reference set.
pub fn read_all(reader: &dyn ReferenceSetReader, descriptors: &[PathBuf]) -> Option<ReferenceSet> {
    let mut union = ReferenceSet::new();
    for descriptor in descriptors {
        let files = reader.read(descriptor);
        if files.is_empty() {
            return None;
        }
        union.extend_from(files);
    }
    Some(union)
}

/// MSBuild writes `\`; on other hosts that is not a separator.
fn native_separators(include: &str) -> String {
    if cfg!(windows) { include.to_string() } else { include.replace('\\', "/") }
}
