//! Relevance classification and duplicate suppression for filesystem events

use super::{ChangeType, MonitorConfig, WatchedEvent};
use crate::reconcile::NormalizedPath;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::trace;

/// Number of recent events remembered for duplicate detection
pub const DUPLICATE_RING_SIZE: usize = 32;

/// Events with the same key closer together than this are duplicates
pub const COINCIDENCE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// Project or filters descriptor changed
    Trigger,
    /// A watched source file appeared, vanished or moved
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    Directory,
    NamePattern(String),
    IgnoredDirectory(String),
    Extension,
    /// Content edits do not change what the project references
    SourceModified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Relevant(Relevance),
    Ignored(IgnoreReason),
}

impl Classification {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Classification::Relevant(_))
    }

    pub fn is_trigger(&self) -> bool {
        *self == Classification::Relevant(Relevance::Trigger)
    }
}

type EventKey = (ChangeType, NormalizedPath, Option<NormalizedPath>);

/// Decides which filesystem events can change the project's reference set
pub struct EventFilter {
    trigger_paths: Vec<NormalizedPath>,
    extensions: Vec<String>,
    name_patterns: Vec<String>,
    ignored_dirs: Vec<String>,
    recent: VecDeque<(EventKey, Instant)>,
}

impl EventFilter {
    pub fn new(config: &MonitorConfig) -> Self {
        let extensions = config
            .watch_extensions
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') { ext } else { format!(".{ext}") }
            })
            .collect();

        // A pattern matching the descriptors themselves would hide trigger events
        let name_patterns = config
            .ignored_name_patterns
            .iter()
            .map(|p| p.to_lowercase())
            .filter(|p| {
                !p.is_empty() && !p.ends_with(".vcxproj") && !p.ends_with(".vcxproj.filters")
            })
            .collect();

        let ignored_dirs = config
            .ignored_dirs
            .iter()
            .map(|d| d.replace('\\', "/").to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Self {
            trigger_paths: config.trigger_paths.iter().map(NormalizedPath::new).collect(),
            extensions,
            name_patterns,
            ignored_dirs,
            recent: VecDeque::with_capacity(DUPLICATE_RING_SIZE),
        }
    }

    pub fn is_trigger_path(&self, path: &Path) -> bool {
        let normalized = NormalizedPath::new(path);
        self.trigger_paths.contains(&normalized)
    }

    pub fn classify(&self, event: &WatchedEvent) -> Classification {
        if event.is_dir {
            return Classification::Ignored(IgnoreReason::Directory);
        }

        let primary = self.classify_path(event.kind, &event.path);
        let Some(secondary) = &event.secondary_path else {
            return primary;
        };

        match (primary, self.classify_path(event.kind, secondary)) {
            (Classification::Relevant(Relevance::Trigger), _)
            | (_, Classification::Relevant(Relevance::Trigger)) => {
                Classification::Relevant(Relevance::Trigger)
            }
            (relevant @ Classification::Relevant(_), _)
            | (_, relevant @ Classification::Relevant(_)) => relevant,
            (ignored, _) => ignored,
        }
    }

    fn classify_path(&self, kind: ChangeType, path: &Path) -> Classification {
        let normalized = NormalizedPath::new(path);
        if self.trigger_paths.contains(&normalized) {
            return Classification::Relevant(Relevance::Trigger);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(pattern) = self.name_patterns.iter().find(|p| name.contains(p.as_str())) {
            return Classification::Ignored(IgnoreReason::NamePattern(pattern.clone()));
        }
        if let Some(dir) = self.ignored_dirs.iter().find(|d| normalized.contains(d)) {
            return Classification::Ignored(IgnoreReason::IgnoredDirectory(dir.clone()));
        }

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !self.extensions.contains(&extension) {
            return Classification::Ignored(IgnoreReason::Extension);
        }

        if kind == ChangeType::Modified {
            return Classification::Ignored(IgnoreReason::SourceModified);
        }

        Classification::Relevant(Relevance::Source)
    }

    /// True if an identical event was seen within the coincidence window.
    ///
    /// Non-duplicates are remembered; the ring keeps the newest entries.
    pub fn is_duplicate(&mut self, event: &WatchedEvent) -> bool {
        let now = event.timestamp;
        self.recent
            .retain(|(_, seen)| now.saturating_duration_since(*seen) < COINCIDENCE_WINDOW);

        let key = (
            event.kind,
            NormalizedPath::new(&event.path),
            event.secondary_path.as_ref().map(NormalizedPath::new),
        );
        if self.recent.iter().any(|(recent, _)| *recent == key) {
            trace!("Duplicate event suppressed: {:?} {}", event.kind, key.1);
            return true;
        }

        if self.recent.len() == DUPLICATE_RING_SIZE {
            self.recent.pop_front();
        }
        self.recent.push_back((key, now));
        false
    }
}
