//! Cohort aggregation
//!
//! [`CohortRun`] carries per-subject results through a run and reduces them
//! into a [`CohortSummary`]. The reduction only uses sums, counts and means,
//! so results may be recorded in any order and runs may be merged.

use crate::error::ComputeError;
use crate::types::{Agreement, CohortMean, CohortSummary, SubjectResult};
use serde::{Deserialize, Serialize};

/// A subject that could not be compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFailure {
    pub subject_id: String,
    /// Machine-readable error code
    pub code: String,
    pub message: String,
}

impl SubjectFailure {
    pub fn new(subject_id: impl Into<String>, error: &ComputeError) -> Self {
        Self {
            subject_id: subject_id.into(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Results accumulated over one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortRun {
    results: Vec<SubjectResult>,
    failures: Vec<SubjectFailure>,
}

impl CohortRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: SubjectResult) {
        self.results.push(result);
    }

    pub fn record_failure(&mut self, failure: SubjectFailure) {
        self.failures.push(failure);
    }

    /// Fold another run's results into this one
    pub fn merge(&mut self, other: CohortRun) {
        self.results.extend(other.results);
        self.failures.extend(other.failures);
    }

    pub fn results(&self) -> &[SubjectResult] {
        &self.results
    }

    pub fn failures(&self) -> &[SubjectFailure] {
        &self.failures
    }

    pub fn result_for(&self, subject_id: &str) -> Option<&SubjectResult> {
        self.results.iter().find(|r| r.subject_id == subject_id)
    }

    /// Reduce the run into cohort figures.
    ///
    /// Gated and empty comparisons are left out of the means; an empty list
    /// yields [`CohortMean::NoData`]. Durations are summed over every
    /// successfully loaded subject.
    pub fn summary(&self) -> CohortSummary {
        let device_pcts: Vec<f64> = self
            .results
            .iter()
            .filter_map(SubjectResult::device_vs_consensus_pct)
            .collect();
        let psg_pcts: Vec<f64> = self
            .results
            .iter()
            .filter_map(SubjectResult::psg_vs_consensus_pct)
            .collect();

        CohortSummary {
            mean_device_agreement_pct: CohortMean::of(&device_pcts),
            mean_psg_agreement_pct: CohortMean::of(&psg_pcts),
            total_artifact_hours: self.results.iter().map(SubjectResult::artifact_hours).sum(),
            total_recorded_hours: self.results.iter().map(SubjectResult::total_hours).sum(),
            subjects_scored: device_pcts.len(),
            subjects_gated: self
                .results
                .iter()
                .filter(|r| r.device_agreement.is_gated())
                .count(),
            subjects_without_epochs: self
                .results
                .iter()
                .filter(|r| r.device_agreement == Agreement::NoEpochs)
                .count(),
            subjects_failed: self.failures.len(),
        }
    }
}
