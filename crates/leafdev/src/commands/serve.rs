//! Preview server command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leafdev_server::{DevServer, DevServerConfig};

use crate::config::load_config;

/// Run the serve command.
pub async fn run(config_path: &Path, port: Option<u16>, dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let root = super::project_root(config_path);
    let dir = dir.unwrap_or_else(|| root.join(&config.dev.serve_dir));

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'leafdev build' first.",
            dir.display()
        );
    }

    let server = DevServer::new(DevServerConfig {
        root: dir,
        port: port.unwrap_or(config.dev.port),
        host: config.dev.host.clone(),
        open: false,
    });

    let bound = server.bind().await.context("Failed to start server")?;
    bound
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
