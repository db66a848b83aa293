//! Configuration file (leafdev.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use leafdev_pipeline::{
    BuildOptions, BuildRequest, CargoGenerator, Pipeline, ProcessRunner, RolldownBundler,
    ScriptBundler, StdioMode,
};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub dev: DevSettings,
}

#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_generator_dir")]
    pub dir: PathBuf,
    /// Show the generator's own output
    #[serde(default)]
    pub inherit_stdio: bool,
}

#[derive(Debug, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default = "default_outfile")]
    pub outfile: String,
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_release_args")]
    pub generator_args: Vec<String>,
    #[serde(default)]
    pub bundle_options: BuildOptions,
}

#[derive(Debug, Deserialize)]
pub struct DevSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_watch")]
    pub watch: Vec<PathBuf>,
    #[serde(default = "default_serve_dir")]
    pub serve_dir: PathBuf,
    #[serde(default)]
    pub generator_args: Vec<String>,
    #[serde(default = "default_dev_options")]
    pub bundle_options: BuildOptions,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            dir: default_generator_dir(),
            inherit_stdio: false,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            outfile: default_outfile(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            generator_args: default_release_args(),
            bundle_options: BuildOptions::new(),
        }
    }
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            watch: default_watch(),
            serve_dir: default_serve_dir(),
            generator_args: Vec::new(),
            bundle_options: default_dev_options(),
        }
    }
}

fn default_program() -> String {
    "cargo".to_string()
}

fn default_generator_dir() -> PathBuf {
    PathBuf::from("leafcodes_ssg")
}

fn default_entry() -> String {
    leafdev_pipeline::options::DEFAULT_ENTRY.to_string()
}

fn default_outfile() -> String {
    leafdev_pipeline::options::DEFAULT_OUTFILE.to_string()
}

fn default_release_args() -> Vec<String> {
    BuildRequest::release().generator_args
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_watch() -> Vec<PathBuf> {
    vec![PathBuf::from("site_src")]
}

fn default_serve_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_dev_options() -> BuildOptions {
    BuildRequest::dev().bundle_options
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    Ok(ConfigFile::default())
}

impl ConfigFile {
    /// Pipeline rooted at `root`, the directory holding the site sources.
    pub fn pipeline(&self, root: &Path) -> Pipeline {
        let stdio = if self.generator.inherit_stdio {
            StdioMode::Inherit
        } else {
            StdioMode::Discard
        };
        let runner = ProcessRunner::new(&self.generator.program, root.join(&self.generator.dir))
            .with_stdio(stdio);

        let bundler = ScriptBundler::new(
            BuildOptions::base(&self.bundle.entry, &self.bundle.outfile),
            Arc::new(RolldownBundler::new(root)),
        );

        Pipeline::new(Arc::new(CargoGenerator::new(runner)), bundler)
    }

    pub fn release_request(&self) -> BuildRequest {
        BuildRequest {
            generator_args: self.build.generator_args.clone(),
            bundle_options: self.build.bundle_options.clone(),
        }
    }

    pub fn dev_request(&self) -> BuildRequest {
        BuildRequest {
            generator_args: self.dev.generator_args.clone(),
            bundle_options: self.dev.bundle_options.clone(),
        }
    }
}
