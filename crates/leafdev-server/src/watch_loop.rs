//! Rebuild-on-change loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use leafdev_pipeline::{BuildRequest, Pipeline};
use tokio::sync::{mpsc, watch};

use crate::watcher::{WatchEventKind, WatchSignal};

/// Lifecycle of a [`WatchLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Waiting for the watcher's initial registration; events are ignored
    Initializing,

    /// Listening for edits
    Ready,

    /// An edit was seen and a build spawned; returns to `Ready` right away
    Triggered,
}

/// Starts one pipeline run per filesystem event.
///
/// Runs are spawned and never awaited, so overlapping edits produce
/// overlapping builds. Nothing serializes, debounces or cancels them; the
/// last run to write the output wins.
#[derive(Clone)]
pub struct WatchLoop {
    pipeline: Pipeline,
    request: BuildRequest,
    state: Arc<watch::Sender<WatchState>>,
    triggered: Arc<AtomicUsize>,
}

impl WatchLoop {
    pub fn new(pipeline: Pipeline, request: BuildRequest) -> Self {
        let (state, _) = watch::channel(WatchState::Initializing);
        Self {
            pipeline,
            request,
            state: Arc::new(state),
            triggered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Number of builds spawned so far.
    pub fn triggered(&self) -> usize {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Consume watcher signals until the channel closes.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<WatchSignal>) {
        while let Some(signal) = rx.recv().await {
            match signal {
                WatchSignal::Ready => {
                    if self.state() == WatchState::Initializing {
                        self.state.send_replace(WatchState::Ready);
                        tracing::info!("Watching for changes...");
                    }
                }
                WatchSignal::Event(event) => {
                    if self.state() == WatchState::Initializing {
                        tracing::trace!("Ignoring {} before ready", event.path.display());
                        continue;
                    }

                    self.state.send_replace(WatchState::Triggered);
                    let kind = match event.kind {
                        WatchEventKind::Added => "add",
                        WatchEventKind::Changed => "change",
                    };
                    tracing::info!(
                        "{} detected ({}), starting build...",
                        kind,
                        event.path.display()
                    );
                    self.spawn_build();
                    self.state.send_replace(WatchState::Ready);
                }
            }
        }

        tracing::debug!("Watch channel closed");
    }

    fn spawn_build(&self) {
        self.triggered.fetch_add(1, Ordering::SeqCst);
        let pipeline = self.pipeline.clone();
        let request = self.request.clone();

        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&request).await {
                tracing::error!("Build failed: {}", e);
            }
        });
    }
}
