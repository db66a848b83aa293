//! One-shot build command.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path, dev: bool) -> Result<()> {
    tracing::info!("Building site...");

    let config = load_config(config_path)?;
    let root = super::project_root(config_path);
    let pipeline = config.pipeline(&root);
    let request = if dev {
        config.dev_request()
    } else {
        config.release_request()
    };

    let report = pipeline.run(&request).await.context("Build failed")?;

    tracing::info!("build complete! ({}ms)", report.duration_ms);
    tracing::info!("Output: {}", report.bundle.outfile.display());
    Ok(())
}
