//! Page generation through an external subprocess.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::PipelineError;

/// What happens to the child's stdout and stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Output is dropped
    #[default]
    Discard,

    /// Output goes to this process's terminal
    Inherit,
}

impl StdioMode {
    fn stdio(self) -> Stdio {
        match self {
            StdioMode::Discard => Stdio::null(),
            StdioMode::Inherit => Stdio::inherit(),
        }
    }
}

/// Runs one external program per call and reports its exit status.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    cwd: PathBuf,
    stdio: StdioMode,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
            stdio: StdioMode::default(),
        }
    }

    pub fn with_stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// Spawn the program with `args` and wait for it to exit.
    ///
    /// Resolves only on exit status 0. The child is always waited on, so no
    /// zombie is left behind.
    pub async fn run(&self, args: &[String]) -> Result<(), PipelineError> {
        tracing::debug!(
            "Running {} {} in {}",
            self.program,
            args.join(" "),
            self.cwd.display()
        );

        let status = Command::new(&self.program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(self.stdio.stdio())
            .stderr(self.stdio.stdio())
            .status()
            .await
            .map_err(|source| PipelineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(PipelineError::NonZeroExit(code)),
            None => Err(PipelineError::Terminated),
        }
    }
}

/// First pipeline stage: produces the static pages.
#[async_trait]
pub trait PageGenerator: Send + Sync {
    /// Generate pages, passing `extra_args` through to the generator.
    async fn generate(&self, extra_args: &[String]) -> Result<(), PipelineError>;
}

/// Page generator run as `<program> run [extra-args...]` in its project root.
#[derive(Debug, Clone)]
pub struct CargoGenerator {
    runner: ProcessRunner,
}

impl CargoGenerator {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PageGenerator for CargoGenerator {
    async fn generate(&self, extra_args: &[String]) -> Result<(), PipelineError> {
        let mut args = Vec::with_capacity(extra_args.len() + 1);
        args.push("run".to_string());
        args.extend(extra_args.iter().cloned());

        self.runner.run(&args).await
    }
}
