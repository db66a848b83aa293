//! Script bundling stage.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{BundleError, Diagnostic};
use crate::options::BuildOptions;

/// Files written by a successful bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    /// The bundle itself
    pub outfile: PathBuf,

    /// Number of script modules included
    pub modules: usize,

    /// Files copied next to the bundle by `copy` loaders
    pub assets: Vec<PathBuf>,
}

/// A bundling library invoked with a complete option set.
///
/// Implementations may block for the whole build; [`ScriptBundler`] calls
/// them from a blocking thread.
pub trait Bundler: Send + Sync {
    fn bundle(&self, options: &BuildOptions) -> Result<BundleOutput, BundleError>;
}

/// Invokes a [`Bundler`] with a fixed base configuration merged with
/// per-call overrides.
#[derive(Clone)]
pub struct ScriptBundler {
    base: BuildOptions,
    engine: Arc<dyn Bundler>,
}

impl ScriptBundler {
    pub fn new(base: BuildOptions, engine: Arc<dyn Bundler>) -> Self {
        Self { base, engine }
    }

    pub fn base(&self) -> &BuildOptions {
        &self.base
    }

    /// The options the engine receives for the given overrides.
    pub fn effective_options(&self, overrides: &BuildOptions) -> BuildOptions {
        self.base.merged(overrides)
    }

    /// Bundle once. Failures are returned as-is, never retried.
    pub async fn run(&self, overrides: &BuildOptions) -> Result<BundleOutput, BundleError> {
        let options = self.effective_options(overrides);
        let engine = Arc::clone(&self.engine);

        tokio::task::spawn_blocking(move || engine.bundle(&options))
            .await
            .map_err(|e| {
                BundleError::single(Diagnostic::options(format!("Bundler task failed: {}", e)))
            })?
    }
}

impl std::fmt::Debug for ScriptBundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBundler")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every option set it is called with.
    #[derive(Default)]
    struct RecordingBundler {
        calls: Mutex<Vec<BuildOptions>>,
        fail: bool,
    }

    impl Bundler for RecordingBundler {
        fn bundle(&self, options: &BuildOptions) -> Result<BundleOutput, BundleError> {
            self.calls.lock().unwrap().push(options.clone());
            if self.fail {
                return Err(BundleError::single(Diagnostic::in_file(
                    "index.js",
                    "Unexpected token",
                )));
            }
            Ok(BundleOutput::default())
        }
    }

    #[tokio::test]
    async fn passes_base_when_no_overrides() {
        let engine = Arc::new(RecordingBundler::default());
        let bundler = ScriptBundler::new(BuildOptions::site_default(), engine.clone());

        bundler.run(&BuildOptions::new()).await.unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], BuildOptions::site_default());
    }

    #[tokio::test]
    async fn overrides_replace_base_keys() {
        let engine = Arc::new(RecordingBundler::default());
        let bundler = ScriptBundler::new(BuildOptions::site_default(), engine.clone());
        let overrides = BuildOptions::new()
            .with("sourcemap", true)
            .with("outfile", "dist/app.js");

        bundler.run(&overrides).await.unwrap();

        let calls = engine.calls.lock().unwrap();
        let effective = &calls[0];
        assert_eq!(effective.get("sourcemap"), Some(&json!(true)));
        assert_eq!(effective.get("outfile"), Some(&json!("dist/app.js")));
        assert_eq!(effective.get("minify"), Some(&json!(true)));
        assert_eq!(effective, &bundler.effective_options(&overrides));
    }

    #[tokio::test]
    async fn surfaces_failure_without_retry() {
        let engine = Arc::new(RecordingBundler {
            fail: true,
            ..Default::default()
        });
        let bundler = ScriptBundler::new(BuildOptions::site_default(), engine.clone());

        let err = bundler.run(&BuildOptions::new()).await.unwrap_err();

        assert_eq!(err.diagnostics[0].message, "Unexpected token");
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }
}
