//! Error types shared by the pipeline stages.

use std::fmt;
use std::path::PathBuf;

/// Errors that can end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Page generator exited with code {0}")]
    NonZeroExit(i32),

    #[error("Page generator was terminated by a signal")]
    Terminated,

    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// A single problem reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the problem was found in, if any
    pub file: Option<PathBuf>,

    /// Human readable message
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic tied to a source file.
    pub fn in_file(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            message: message.into(),
        }
    }

    /// Diagnostic about the bundler options themselves.
    pub fn options(message: impl Into<String>) -> Self {
        Self {
            file: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}", file.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Bundling failed; carries every diagnostic the bundler collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Bundling failed with {} error(s){}", .diagnostics.len(), first_line(.diagnostics))]
pub struct BundleError {
    pub diagnostics: Vec<Diagnostic>,
}

impl BundleError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn single(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

fn first_line(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}
