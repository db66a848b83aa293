//! Dev mode orchestration: initial build, then watch and serve.

use std::net::SocketAddr;
use std::path::PathBuf;

use leafdev_pipeline::{BuildRequest, Pipeline, PipelineError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::server::{DevServer, DevServerConfig, ServerError};
use crate::watch_loop::{WatchLoop, WatchState};
use crate::watcher::FileWatcher;

/// Everything a dev session needs besides the pipeline.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Paths whose edits trigger a rebuild
    pub watch: Vec<PathBuf>,

    /// Request used for the initial build and every rebuild
    pub request: BuildRequest,

    pub server: DevServerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            watch: vec![PathBuf::from("site_src")],
            request: BuildRequest::dev(),
            server: DevServerConfig::default(),
        }
    }
}

/// Errors that can prevent a session from starting.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Initial build failed: {0}")]
    InitialBuild(#[from] PipelineError),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A running dev session: the watch loop and the server, each on its own
/// task and independent of the other.
pub struct DevSession {
    watch_loop: WatchLoop,
    watch_task: JoinHandle<()>,
    server_task: JoinHandle<Result<(), ServerError>>,
    shutdown: oneshot::Sender<()>,
    local_addr: SocketAddr,
    _watcher: FileWatcher,
}

impl DevSession {
    /// Build once, then arm the watcher and the server.
    ///
    /// If the first build fails nothing is started.
    pub async fn start(pipeline: Pipeline, config: SessionConfig) -> Result<Self, SessionError> {
        pipeline.run(&config.request).await?;

        let (watcher, rx) = FileWatcher::new(&config.watch)?;
        let watch_loop = WatchLoop::new(pipeline, config.request);
        let watch_task = {
            let watch_loop = watch_loop.clone();
            tokio::spawn(async move { watch_loop.run(rx).await })
        };

        let bound = match DevServer::new(config.server).bind().await {
            Ok(bound) => bound,
            Err(e) => {
                watch_task.abort();
                return Err(e.into());
            }
        };
        let local_addr = bound.local_addr();

        let (shutdown, stopped) = oneshot::channel();
        let server_task = tokio::spawn(bound.serve(async move {
            let _ = stopped.await;
        }));

        Ok(Self {
            watch_loop,
            watch_task,
            server_task,
            shutdown,
            local_addr,
            _watcher: watcher,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn watch_state(&self) -> WatchState {
        self.watch_loop.state()
    }

    /// Number of rebuilds triggered by file events.
    pub fn rebuilds(&self) -> usize {
        self.watch_loop.triggered()
    }

    /// Run until Ctrl-C or until the server stops on its own.
    pub async fn wait(mut self) -> Result<(), ServerError> {
        let finished = tokio::select! {
            result = &mut self.server_task => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match finished {
            Some(result) => {
                self.watch_task.abort();
                flatten(result)
            }
            None => {
                tracing::info!("Shutting down");
                self.stop().await
            }
        }
    }

    /// Stop watching and shut the server down gracefully.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.watch_task.abort();
        let _ = self.shutdown.send(());
        flatten(self.server_task.await)
    }
}

fn flatten(
    result: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(inner) => inner,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(ServerError::Serve(std::io::Error::other(e))),
    }
}
