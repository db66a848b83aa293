//! Static file server for the build output.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("build"),
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Serves files from the output directory.
///
/// Every request reads from disk, so a finished rebuild is visible on the
/// next request. Directories resolve to `index.html`; missing files are 404.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Router serving the configured directory.
    pub fn router(&self) -> Router {
        Router::new().fallback_service(ServeDir::new(&self.config.root))
    }

    /// Bind the listener. Port 0 picks a free port.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr.clone()))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr.to_string(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(addr.to_string(), e))?;

        Ok(BoundServer {
            router: self.router(),
            listener,
            local_addr,
            open: self.config.open,
        })
    }
}

/// A server whose listener is bound but not yet accepting.
pub struct BoundServer {
    router: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
    open: bool,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Accept requests until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let url = self.url();
        tracing::info!("Serving at {}", url);

        if self.open {
            let _ = open::that(&url);
        }

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}
