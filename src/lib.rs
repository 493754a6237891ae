//! Hypnogram Agreement - scoring engine for automated vs. expert sleep staging
//!
//! Compares automated sleep-stage scores from a wearable headband and from full
//! polysomnography (PSG) against the human-expert consensus, across a cohort of
//! subjects, through a deterministic pipeline: table loading → exclusion filter
//! → quality gate → agreement scoring, with duration metrics and cohort
//! aggregation alongside.
//!
//! ## Modules
//!
//! - **Scoring**: per-subject agreement percentages and data-quality figures
//! - **Cohort**: order-independent reduction into cohort means and totals
//! - **Review**: lookup of one subject's time-aligned series for plotting

pub mod agreement;
pub mod cohort;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod review;
pub mod types;

pub use cohort::{CohortRun, SubjectFailure};
pub use config::{AnalysisConfig, TotalDurationPolicy};
pub use discovery::{discover_subjects, SubjectFiles};
pub use error::{ComputeError, Misalignment};
pub use pipeline::{evaluate_cohort, AgreementProcessor};
pub use report::{CohortReport, ReportEncoder};
pub use review::{AlignedSeries, SubjectResolver};
pub use types::{Agreement, CohortMean, CohortSummary, EpochTable, StageCode, SubjectResult};

/// Crate version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "hypnogram-agreement";
