//! Error types for hypnogram agreement scoring

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// How two tables that should describe the same epochs disagree
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Misalignment {
    /// Different number of epochs on each side
    Length { automated: usize, consensus: usize },
    /// Same length, but the onset of `epoch` differs
    Onset {
        epoch: usize,
        automated: f64,
        consensus: f64,
    },
}

impl fmt::Display for Misalignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misalignment::Length {
                automated,
                consensus,
            } => write!(
                f,
                "automated table has {} epochs, consensus table has {}",
                automated, consensus
            ),
            Misalignment::Onset {
                epoch,
                automated,
                consensus,
            } => write!(
                f,
                "onset of epoch {} is {} in the automated table, {} in the consensus table",
                epoch, automated, consensus
            ),
        }
    }
}

/// Errors that abort processing of a single subject or lookup.
///
/// Records that are too noisy to score, or that have no epochs left after
/// filtering, are not errors: see [`crate::types::Agreement`].
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Input not found: {path}: {source}")]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Alignment error during {stage}: {mismatch}")]
    Alignment {
        stage: &'static str,
        mismatch: Misalignment,
    },

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Invalid TSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ComputeError {
    /// Build an [`ComputeError::InputNotFound`] for `path`
    pub fn input_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ComputeError::InputNotFound {
            path: path.into(),
            source,
        }
    }

    /// Build an [`ComputeError::Alignment`] for tables of different lengths
    pub fn length_mismatch(stage: &'static str, automated: usize, consensus: usize) -> Self {
        ComputeError::Alignment {
            stage,
            mismatch: Misalignment::Length {
                automated,
                consensus,
            },
        }
    }

    /// Short machine-readable code, used by the CLI and the cohort report
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::InputNotFound { .. } => "INPUT_NOT_FOUND",
            ComputeError::MalformedInput(_) => "MALFORMED_INPUT",
            ComputeError::Alignment { .. } => "ALIGNMENT_ERROR",
            ComputeError::SubjectNotFound(_) => "SUBJECT_NOT_FOUND",
            ComputeError::Csv(_) => "TSV_ERROR",
            ComputeError::Json(_) => "JSON_ERROR",
            ComputeError::Config(_) => "CONFIG_ERROR",
        }
    }
}
