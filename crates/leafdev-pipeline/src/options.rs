//! Bundler options and their shallow merge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{BundleError, Diagnostic};

/// Default script entry point, relative to the project root.
pub const DEFAULT_ENTRY: &str = "site_src/script/index.js";

/// Default bundle location, relative to the project root.
pub const DEFAULT_OUTFILE: &str = "build/bundle.js";

/// Untyped bundler options keyed by option name (`entryPoints`, `minify`, ...).
///
/// Merging is shallow: an override key replaces the base value wholesale,
/// nested objects such as `loader` are never combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOptions(Map<String, Value>);

impl BuildOptions {
    /// Empty option set, usable as "no overrides".
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed base configuration for the given entry and output file.
    pub fn base(entry: impl Into<String>, outfile: impl Into<String>) -> Self {
        let entry: String = entry.into();
        Self::new()
            .with("entryPoints", json!([entry]))
            .with("outfile", Value::String(outfile.into()))
            .with("bundle", true)
            .with("format", "esm")
            .with("minify", true)
            .with("target", json!(["es6"]))
            .with("loader", json!({ ".woff2": "copy" }))
            .with("assetNames", "[name]")
    }

    /// Base configuration with the default site paths.
    pub fn site_default() -> Self {
        Self::base(DEFAULT_ENTRY, DEFAULT_OUTFILE)
    }

    /// Set a single option, returning the updated set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up an option by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: keys from `overrides` replace keys of `self`.
    pub fn merged(&self, overrides: &BuildOptions) -> BuildOptions {
        let mut map = self.0.clone();
        for (key, value) in &overrides.0 {
            map.insert(key.clone(), value.clone());
        }
        BuildOptions(map)
    }

    /// Typed view of the options consumed by the bundling engine.
    pub fn settings(&self) -> Result<BundleSettings, BundleError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            BundleError::single(Diagnostic::options(format!("Invalid build options: {}", e)))
        })
    }
}

/// How files with a given extension are handled when imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    /// Parse as a script module and bundle it
    Js,

    /// Copy the file verbatim next to the bundle
    Copy,
}

/// Options the bundling engine understands. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSettings {
    pub entry_points: Vec<PathBuf>,

    pub outfile: PathBuf,

    #[serde(default)]
    pub bundle: bool,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub minify: bool,

    #[serde(default)]
    pub target: Vec<String>,

    #[serde(default)]
    pub loader: BTreeMap<String, Loader>,

    #[serde(default = "default_asset_names")]
    pub asset_names: String,

    #[serde(default)]
    pub sourcemap: bool,
}

fn default_format() -> String {
    "esm".to_string()
}

fn default_asset_names() -> String {
    "[name]".to_string()
}

impl BundleSettings {
    /// Loader for a file extension given with its leading dot.
    pub fn loader_for(&self, extension: &str) -> Option<Loader> {
        match self.loader.get(extension) {
            Some(loader) => Some(*loader),
            None if matches!(extension, ".js" | ".mjs" | ".cjs" | ".json") => Some(Loader::Js),
            None => None,
        }
    }
}
