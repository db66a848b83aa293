//! CLI command implementations.

pub mod build;
pub mod dev;
pub mod serve;

use std::path::{Path, PathBuf};

/// Directory the config file lives in; relative paths resolve against it.
fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
