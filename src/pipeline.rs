//! Pipeline orchestration
//!
//! This module provides the public API for scoring a cohort.
//! It orchestrates, per subject: loading → time-axis check → duration metrics
//! → exclusion filter → quality gate / agreement scoring, then folds every
//! subject into a [`CohortRun`].

use crate::agreement::AgreementScorer;
use crate::cohort::{CohortRun, SubjectFailure};
use crate::config::AnalysisConfig;
use crate::discovery::{discover_subjects, SubjectFiles};
use crate::error::{ComputeError, Misalignment};
use crate::filter::ExclusionFilter;
use crate::loader::EpochTableLoader;
use crate::metrics::DurationMetrics;
use crate::quality::QualityGate;
use crate::types::{Agreement, EpochTable, Modality, ScoreColumn, SubjectResult};
use std::path::Path;
use tracing::{error, info, warn};

/// Onsets closer than this are treated as the same epoch (seconds)
const ONSET_TOLERANCE: f64 = 1e-6;

/// Score every complete subject under `root`.
///
/// # Example
/// ```ignore
/// let run = evaluate_cohort(Path::new("data"), &AnalysisConfig::default())?;
/// println!("{}", run.summary().mean_device_agreement_pct);
/// ```
pub fn evaluate_cohort(root: &Path, config: &AnalysisConfig) -> Result<CohortRun, ComputeError> {
    AgreementProcessor::new(config.clone())?.run_directory(root)
}

/// Verify that two tables describe the same epochs before any filtering
pub fn check_time_axis(device: &EpochTable, consensus: &EpochTable) -> Result<(), ComputeError> {
    if device.len() != consensus.len() {
        return Err(ComputeError::length_mismatch(
            "time axis check",
            device.len(),
            consensus.len(),
        ));
    }

    if let (Some(a), Some(b)) = (device.onset(), consensus.onset()) {
        if let Some(idx) = a
            .iter()
            .zip(b)
            .position(|(x, y)| (x - y).abs() > ONSET_TOLERANCE)
        {
            return Err(ComputeError::Alignment {
                stage: "time axis check",
                mismatch: Misalignment::Onset {
                    epoch: idx,
                    automated: a[idx],
                    consensus: b[idx],
                },
            });
        }
    }

    Ok(())
}

/// Per-subject and per-cohort processor for a fixed configuration
#[derive(Debug, Clone)]
pub struct AgreementProcessor {
    config: AnalysisConfig,
    scorer: AgreementScorer,
    durations: DurationMetrics,
}

impl AgreementProcessor {
    /// Create a processor, rejecting an invalid configuration
    pub fn new(config: AnalysisConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            scorer: AgreementScorer::new(QualityGate::new(config.quality_gate_threshold_pct)),
            durations: DurationMetrics::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load the headband and PSG tables of one subject
    pub fn load_subject(&self, files: &SubjectFiles) -> Result<(EpochTable, EpochTable), ComputeError> {
        let device = EpochTableLoader::load_path(&files.headband, &[ScoreColumn::AiHb])?;
        let psg = EpochTableLoader::load_path(
            &files.psg,
            &[ScoreColumn::Majority, ScoreColumn::AiPsg],
        )?;
        Ok((device, psg))
    }

    /// Score one subject from its loaded tables
    pub fn evaluate_tables(
        &self,
        subject_id: &str,
        device: &EpochTable,
        psg: &EpochTable,
    ) -> Result<SubjectResult, ComputeError> {
        check_time_axis(device, psg)?;

        let duration = self.durations.measure(device)?;

        let device_pair = ExclusionFilter::apply(device, psg)?;
        let device_agreement = self.scorer.score(Modality::Headband, &device_pair)?;
        log_agreement(subject_id, Modality::Headband, &device_agreement);

        let psg_pair = ExclusionFilter::apply(psg, psg)?;
        let psg_agreement = self.scorer.score(Modality::Psg, &psg_pair)?;
        log_agreement(subject_id, Modality::Psg, &psg_agreement);

        Ok(SubjectResult {
            subject_id: subject_id.to_string(),
            device_agreement,
            psg_agreement,
            duration,
        })
    }

    /// Load and score one subject
    pub fn process_subject(&self, files: &SubjectFiles) -> Result<SubjectResult, ComputeError> {
        let (device, psg) = self.load_subject(files)?;
        self.evaluate_tables(&files.subject_id, &device, &psg)
    }

    /// Score every subject; failures are recorded and do not stop the run
    pub fn run_cohort(&self, subjects: &[SubjectFiles]) -> CohortRun {
        let mut run = CohortRun::new();

        for files in subjects {
            match self.process_subject(files) {
                Ok(result) => run.record(result),
                Err(e) => {
                    error!(subject = %files.subject_id, error = %e, "subject skipped");
                    run.record_failure(SubjectFailure::new(&files.subject_id, &e));
                }
            }
        }

        let summary = run.summary();
        info!(
            subjects = subjects.len(),
            scored = summary.subjects_scored,
            gated = summary.subjects_gated,
            failed = summary.subjects_failed,
            "cohort run complete"
        );
        run
    }

    /// Discover subjects under `root` and score them
    pub fn run_directory(&self, root: &Path) -> Result<CohortRun, ComputeError> {
        let subjects = discover_subjects(root, &self.config)?;
        if subjects.is_empty() {
            warn!(root = %root.display(), "no complete subjects found");
        }
        Ok(self.run_cohort(&subjects))
    }
}

fn log_agreement(subject_id: &str, modality: Modality, agreement: &Agreement) {
    match agreement {
        Agreement::Scored {
            percent,
            epochs_compared,
        } => info!(
            subject = %subject_id,
            modality = modality.as_str(),
            epochs = epochs_compared,
            "comparison completed, {:.2}% match",
            percent
        ),
        Agreement::QualityGateFailed { artifact_rate_pct } => warn!(
            subject = %subject_id,
            modality = modality.as_str(),
            "artifact rate too high ({:.2}%), skipping comparison",
            artifact_rate_pct
        ),
        Agreement::NoEpochs => warn!(
            subject = %subject_id,
            modality = modality.as_str(),
            "filtered data is empty, skipping comparison"
        ),
    }
}
