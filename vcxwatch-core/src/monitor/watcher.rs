//! Recursive filesystem watcher built on notify

use super::{ChangeType, MonitorError, Result, WatchedEvent};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Keeps the underlying watcher alive; dropping it stops event delivery
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl WatcherHandle {
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

pub struct FileWatcher {
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Start watching every existing root recursively.
    ///
    /// Events arrive on the returned channel in delivery order, translated from
    /// notify's callback thread.
    pub fn start(self) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<WatchedEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in process_event(event) {
                    if tx.send(change).is_err() {
                        debug!("Event receiver closed, dropping event");
                        return;
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        let mut watched = Vec::new();
        for root in self.roots {
            if !root.is_dir() {
                warn!("Watch path is not a directory, skipping: {:?}", root);
                continue;
            }
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|source| MonitorError::Watch { path: root.clone(), source })?;
            info!("Watching path: {:?}", root);
            watched.push(root);
        }

        if watched.is_empty() {
            return Err(MonitorError::NothingToWatch);
        }

        Ok((WatcherHandle { _watcher: watcher, roots: watched }, rx))
    }
}

/// Translate a notify event into zero or more watched events
fn process_event(event: Event) -> Vec<WatchedEvent> {
    let paths = event.paths;

    match event.kind {
        EventKind::Create(kind) => paths
            .into_iter()
            .map(|path| {
                let is_dir = kind == CreateKind::Folder || path.is_dir();
                with_dir(WatchedEvent::new(ChangeType::Created, path), is_dir)
            })
            .collect(),

        EventKind::Remove(kind) => paths
            .into_iter()
            .map(|path| {
                with_dir(WatchedEvent::new(ChangeType::Deleted, path), kind == RemoveKind::Folder)
            })
            .collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if paths.len() >= 2 => {
                let is_dir = paths[1].is_dir();
                let mut paths = paths.into_iter();
                match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => vec![with_dir(WatchedEvent::moved(from, to), is_dir)],
                    _ => Vec::new(),
                }
            }
            RenameMode::From => paths
                .into_iter()
                .map(|path| WatchedEvent::new(ChangeType::Deleted, path))
                .collect(),
            RenameMode::To => paths
                .into_iter()
                .map(|path| {
                    let is_dir = path.is_dir();
                    with_dir(WatchedEvent::new(ChangeType::Created, path), is_dir)
                })
                .collect(),
            // Platform did not say which side of the rename this is
            _ => paths
                .into_iter()
                .map(|path| {
                    if path.exists() {
                        let is_dir = path.is_dir();
                        with_dir(WatchedEvent::new(ChangeType::Created, path), is_dir)
                    } else {
                        WatchedEvent::new(ChangeType::Deleted, path)
                    }
                })
                .collect(),
        },

        EventKind::Modify(_) => paths
            .into_iter()
            .map(|path| {
                let is_dir = path.is_dir();
                with_dir(WatchedEvent::new(ChangeType::Modified, path), is_dir)
            })
            .collect(),

        // Access, Any and Other carry no add/remove information
        _ => Vec::new(),
    }
}

fn with_dir(event: WatchedEvent, is_dir: bool) -> WatchedEvent {
    if is_dir { event.directory() } else { event }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};
    use tempfile::TempDir;
    use tokio::time::{Duration, sleep};

    #[test]
    fn test_rename_pair_becomes_move() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/nonexistent/a.cpp"))
            .add_path(PathBuf::from("/nonexistent/b.cpp"));

        let events = process_event(event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::Moved);
        assert_eq!(events[0].path, PathBuf::from("/nonexistent/a.cpp"));
        assert_eq!(events[0].secondary_path, Some(PathBuf::from("/nonexistent/b.cpp")));
    }

    #[test]
    fn test_rename_halves_map_to_delete_and_create() {
        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/nonexistent/a.cpp"));
        assert_eq!(process_event(from)[0].kind, ChangeType::Deleted);

        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/nonexistent/b.cpp"));
        assert_eq!(process_event(to)[0].kind, ChangeType::Created);

        let unknown = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(PathBuf::from("/nonexistent/c.cpp"));
        assert_eq!(process_event(unknown)[0].kind, ChangeType::Deleted);
    }

    #[test]
    fn test_kind_mapping() {
        let create = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/nonexistent/dir"));
        let created = process_event(create);
        assert_eq!(created[0].kind, ChangeType::Created);
        assert!(created[0].is_dir);

        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/nonexistent/a.cpp"));
        assert_eq!(process_event(modify)[0].kind, ChangeType::Modified);

        let remove = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/nonexistent/a.cpp"));
        assert_eq!(process_event(remove)[0].kind, ChangeType::Deleted);

        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/nonexistent/a.cpp"));
        assert!(process_event(access).is_empty());
    }

    #[test]
    fn test_no_existing_roots_is_an_error() {
        let watcher = FileWatcher::new(vec![PathBuf::from("/nonexistent/vcxwatch-root")]);
        assert!(matches!(watcher.start(), Err(MonitorError::NothingToWatch)));
    }

    #[tokio::test]
    async fn test_file_watcher_detects_creation() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("Actor.cpp");

        let (handle, mut rx) =
            FileWatcher::new(vec![temp_dir.path().to_path_buf()]).start().unwrap();
        assert_eq!(handle.roots().len(), 1);

        std::fs::write(&test_file, "int x;").unwrap();
        sleep(Duration::from_millis(300)).await;

        if let Ok(change) = rx.try_recv() {
            assert_eq!(change.kind, ChangeType::Created);
            assert_eq!(change.path.file_name(), test_file.file_name());
        }
    }
}
