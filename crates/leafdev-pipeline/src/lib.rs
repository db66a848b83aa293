//! Build pipeline for leafdev.
//!
//! Runs the external page generator as a subprocess, then bundles the site
//! scripts in-process. The two stages are strictly ordered and fail fast.

pub mod bundler;
pub mod error;
pub mod engine;
mod loader_plugin;
pub mod options;
pub mod pipeline;
pub mod process;

pub use bundler::{BundleOutput, Bundler, ScriptBundler};
pub use error::{BundleError, Diagnostic, PipelineError};
pub use engine::RolldownBundler;
pub use options::{BuildOptions, BundleSettings, Loader};
pub use pipeline::{BuildReport, BuildRequest, Pipeline};
pub use process::{CargoGenerator, PageGenerator, ProcessRunner, StdioMode};
