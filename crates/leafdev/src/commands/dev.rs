//! Development mode command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use leafdev_server::{DevServerConfig, DevSession, SessionConfig};

use crate::config::load_config;

/// Run the dev session until Ctrl-C.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let root = super::project_root(config_path);

    let session_config = SessionConfig {
        watch: config
            .dev
            .watch
            .iter()
            .map(|p| root.join(p))
            .collect::<Vec<PathBuf>>(),
        request: config.dev_request(),
        server: DevServerConfig {
            root: root.join(&config.dev.serve_dir),
            port: port.unwrap_or(config.dev.port),
            host: config.dev.host.clone(),
            open,
        },
    };

    tracing::info!("Starting development build");
    let session = DevSession::start(config.pipeline(&root), session_config).await?;

    session.wait().await?;
    Ok(())
}
