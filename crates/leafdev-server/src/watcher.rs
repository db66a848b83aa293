//! File watching for rebuilds.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Added,
    Changed,
}

/// A filesystem change worth rebuilding for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Added,
        }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Changed,
        }
    }
}

/// Messages delivered by a [`FileWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// All paths are registered; later events are real edits
    Ready,

    Event(WatchEvent),
}

/// Recursive watcher over a set of paths. Dropping it stops the events.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths` recursively.
    ///
    /// Returns the watcher and a channel that yields [`WatchSignal::Ready`]
    /// once every existing path is registered, followed by events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchSignal>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let event_tx = tx.clone();
        let mut classifier = EventClassifier::default();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for path in &event.paths {
                        if let Some(e) = classifier.classify(path, &event.kind) {
                            let _ = event_tx.send(WatchSignal::Event(e));
                        }
                    }
                }
                Err(e) => tracing::warn!("File watch error: {}", e),
            }
        })?;

        for path in paths {
            if path.exists() {
                watcher.watch(path, RecursiveMode::Recursive)?;
                tracing::debug!("Watching {}", path.display());
            } else {
                tracing::warn!("Watch path does not exist: {}", path.display());
            }
        }

        let _ = tx.send(WatchSignal::Ready);

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Folds the raw notify events for one logical edit into a single
/// [`WatchEvent`]. Removals, reads, metadata and directory changes are not
/// rebuild triggers.
#[derive(Debug, Default)]
struct EventClassifier {
    /// Files created but not yet reported
    created: HashSet<PathBuf>,
}

impl EventClassifier {
    /// inotify reports every finished write with a close event, so that is
    /// the single point a file counts as added or changed.
    #[cfg(target_os = "linux")]
    fn classify(&mut self, path: &Path, kind: &EventKind) -> Option<WatchEvent> {
        match kind {
            EventKind::Create(CreateKind::File | CreateKind::Any) => {
                self.created.insert(path.to_path_buf());
                None
            }
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                if self.created.remove(path) {
                    Some(WatchEvent::added(path))
                } else {
                    Some(WatchEvent::changed(path))
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchEvent::changed(path)),
            _ => None,
        }
    }

    /// Without close events the first data change after a create belongs to
    /// the create.
    #[cfg(not(target_os = "linux"))]
    fn classify(&mut self, path: &Path, kind: &EventKind) -> Option<WatchEvent> {
        match kind {
            EventKind::Create(CreateKind::File | CreateKind::Any) => {
                self.created.insert(path.to_path_buf());
                Some(WatchEvent::added(path))
            }
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
                if self.created.remove(path) {
                    None
                } else {
                    Some(WatchEvent::changed(path))
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchEvent::changed(path)),
            _ => None,
        }
    }
}
