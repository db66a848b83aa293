//! Two-stage build: page generation, then script bundling.

use std::sync::Arc;
use std::time::Instant;

use crate::bundler::{BundleOutput, ScriptBundler};
use crate::error::PipelineError;
use crate::options::BuildOptions;
use crate::process::PageGenerator;

/// Per-run inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildRequest {
    /// Extra arguments for the page generator
    pub generator_args: Vec<String>,

    /// Bundler options merged over the base configuration
    pub bundle_options: BuildOptions,
}

impl BuildRequest {
    /// Production build: optimized page generator, base bundler options.
    pub fn release() -> Self {
        Self {
            generator_args: vec!["--release".to_string()],
            bundle_options: BuildOptions::new(),
        }
    }

    /// Development build: debug page generator, source maps on.
    pub fn dev() -> Self {
        Self {
            generator_args: Vec::new(),
            bundle_options: BuildOptions::new().with("sourcemap", true),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub bundle: BundleOutput,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// Runs page generation to completion and only then bundles.
///
/// Runs share nothing: several may be in flight at once and none waits on
/// or cancels another.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn PageGenerator>,
    bundler: ScriptBundler,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn PageGenerator>, bundler: ScriptBundler) -> Self {
        Self { generator, bundler }
    }

    pub fn bundler(&self) -> &ScriptBundler {
        &self.bundler
    }

    /// One pipeline run. The first failing stage's error is returned as-is.
    pub async fn run(&self, request: &BuildRequest) -> Result<BuildReport, PipelineError> {
        let start = Instant::now();

        tracing::debug!("Generating pages");
        self.generator.generate(&request.generator_args).await?;

        tracing::debug!("Bundling scripts");
        let bundle = self.bundler.run(&request.bundle_options).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Build complete in {}ms: {}",
            duration_ms,
            bundle.outfile.display()
        );

        Ok(BuildReport {
            bundle,
            duration_ms,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("bundler", &self.bundler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::Bundler;
    use crate::error::{BundleError, Diagnostic};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Shared log of stage invocations, in order.
    type Journal = Arc<Mutex<Vec<&'static str>>>;

    struct FakeGenerator {
        journal: Journal,
        exit: Option<i32>,
        args: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl PageGenerator for FakeGenerator {
        async fn generate(&self, extra_args: &[String]) -> Result<(), PipelineError> {
            self.args.lock().unwrap().push(extra_args.to_vec());
            tokio::task::yield_now().await;
            self.journal.lock().unwrap().push("generate");
            match self.exit {
                Some(code) => Err(PipelineError::NonZeroExit(code)),
                None => Ok(()),
            }
        }
    }

    struct FakeBundler {
        journal: Journal,
        calls: AtomicUsize,
        fail: bool,
    }

    impl Bundler for FakeBundler {
        fn bundle(&self, _options: &BuildOptions) -> Result<BundleOutput, BundleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.journal.lock().unwrap().push("bundle");
            if self.fail {
                Err(BundleError::single(Diagnostic::options("boom")))
            } else {
                Ok(BundleOutput::default())
            }
        }
    }

    fn pipeline(exit: Option<i32>, fail: bool) -> (Pipeline, Arc<FakeGenerator>, Arc<FakeBundler>, Journal) {
        let journal: Journal = Arc::default();
        let generator = Arc::new(FakeGenerator {
            journal: journal.clone(),
            exit,
            args: Mutex::default(),
        });
        let bundler = Arc::new(FakeBundler {
            journal: journal.clone(),
            calls: AtomicUsize::new(0),
            fail,
        });
        let pipeline = Pipeline::new(
            generator.clone(),
            ScriptBundler::new(BuildOptions::site_default(), bundler.clone()),
        );
        (pipeline, generator, bundler, journal)
    }

    #[tokio::test]
    async fn runs_generation_before_bundling() {
        let (pipeline, generator, bundler, journal) = pipeline(None, false);

        pipeline.run(&BuildRequest::release()).await.unwrap();

        assert_eq!(*journal.lock().unwrap(), vec!["generate", "bundle"]);
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *generator.args.lock().unwrap(),
            vec![vec!["--release".to_string()]]
        );
    }

    #[tokio::test]
    async fn generation_failure_skips_bundling() {
        let (pipeline, _, bundler, _) = pipeline(Some(2), false);

        let err = pipeline.run(&BuildRequest::release()).await.unwrap_err();

        assert!(matches!(err, PipelineError::NonZeroExit(2)));
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bundling_failure_is_returned() {
        let (pipeline, _, bundler, _) = pipeline(None, true);

        let err = pipeline.run(&BuildRequest::dev()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Bundle(_)));
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dev_request_enables_source_maps() {
        let request = BuildRequest::dev();
        assert!(request.generator_args.is_empty());
        assert_eq!(
            request.bundle_options.get("sourcemap"),
            Some(&serde_json::json!(true))
        );
    }
}
