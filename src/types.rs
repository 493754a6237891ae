//! Core types for hypnogram agreement scoring
//!
//! This module defines the data structures that flow through each stage of the
//! comparison: stage codes and their reserved sentinels, epoch tables, per-subject
//! results and the cohort summary.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Header of the epoch time-offset column (seconds)
pub const ONSET_HEADER: &str = "onset";

/// Integer sleep-stage code as it appears in an epoch table.
///
/// Two codes are reserved and never take part in an agreement comparison:
/// [`StageCode::UNSCORED`] on the consensus side and [`StageCode::ARTIFACT`] on
/// the headband-AI side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageCode(pub i32);

impl StageCode {
    /// PSG disconnection (e.g. bathroom break). Human-scored only.
    pub const UNSCORED: StageCode = StageCode(8);
    /// Artifact or missing data. Headband-AI-scored only.
    pub const ARTIFACT: StageCode = StageCode(-2);

    pub fn is_unscored(self) -> bool {
        self == Self::UNSCORED
    }

    pub fn is_artifact(self) -> bool {
        self == Self::ARTIFACT
    }
}

impl From<i32> for StageCode {
    fn from(code: i32) -> Self {
        StageCode(code)
    }
}

impl fmt::Display for StageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Categorical score columns understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreColumn {
    /// Human-expert consensus score
    Majority,
    /// Headband (device) automated score
    AiHb,
    /// PSG automated score
    AiPsg,
}

impl ScoreColumn {
    pub const ALL: [ScoreColumn; 3] = [ScoreColumn::Majority, ScoreColumn::AiHb, ScoreColumn::AiPsg];

    /// Column header in the TSV source
    pub fn header(&self) -> &'static str {
        match self {
            ScoreColumn::Majority => "majority",
            ScoreColumn::AiHb => "ai_hb",
            ScoreColumn::AiPsg => "ai_psg",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == header)
    }
}

impl fmt::Display for ScoreColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Recording modality an automated score was produced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Headband,
    Psg,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Headband => "headband",
            Modality::Psg => "psg",
        }
    }

    /// Column holding this modality's automated score
    pub fn score_column(&self) -> ScoreColumn {
        match self {
            Modality::Headband => ScoreColumn::AiHb,
            Modality::Psg => ScoreColumn::AiPsg,
        }
    }
}

/// Ordered sequence of fixed-duration epochs with their categorical scores.
///
/// Stored column-wise; every column has exactly `len` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochTable {
    onset: Option<Vec<f64>>,
    scores: BTreeMap<ScoreColumn, Vec<StageCode>>,
    len: usize,
}

impl EpochTable {
    /// Assemble a table from its columns, rejecting ragged input
    pub fn from_parts(
        onset: Option<Vec<f64>>,
        scores: impl IntoIterator<Item = (ScoreColumn, Vec<StageCode>)>,
    ) -> Result<Self, ComputeError> {
        let scores: BTreeMap<_, _> = scores.into_iter().collect();
        let len = onset
            .as_ref()
            .map(Vec::len)
            .or_else(|| scores.values().next().map(Vec::len))
            .unwrap_or(0);

        if let Some(values) = &onset {
            if values.len() != len {
                return Err(ComputeError::MalformedInput(format!(
                    "column '{}' has {} rows, expected {}",
                    ONSET_HEADER,
                    values.len(),
                    len
                )));
            }
        }
        for (column, codes) in &scores {
            if codes.len() != len {
                return Err(ComputeError::MalformedInput(format!(
                    "column '{}' has {} rows, expected {}",
                    column,
                    codes.len(),
                    len
                )));
            }
        }

        Ok(Self { onset, scores, len })
    }

    /// Number of epochs
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn onset(&self) -> Option<&[f64]> {
        self.onset.as_deref()
    }

    pub fn has_column(&self, column: ScoreColumn) -> bool {
        self.scores.contains_key(&column)
    }

    pub fn column(&self, column: ScoreColumn) -> Option<&[StageCode]> {
        self.scores.get(&column).map(Vec::as_slice)
    }

    /// Like [`EpochTable::column`], but absence is a [`ComputeError::MalformedInput`]
    pub fn require(&self, column: ScoreColumn) -> Result<&[StageCode], ComputeError> {
        self.column(column).ok_or_else(|| {
            ComputeError::MalformedInput(format!("required column '{}' is absent", column))
        })
    }

    /// Number of epochs in `column` carrying `code` (0 if the column is absent)
    pub fn count(&self, column: ScoreColumn, code: StageCode) -> usize {
        self.column(column)
            .map(|codes| codes.iter().filter(|&&c| c == code).count())
            .unwrap_or(0)
    }

    /// Keep the rows where `mask` is true, re-indexed contiguously from 0.
    ///
    /// Returns an alignment error if the mask does not cover every row.
    pub fn retain(&self, mask: &[bool]) -> Result<EpochTable, ComputeError> {
        if mask.len() != self.len {
            return Err(ComputeError::length_mismatch(
                "mask application",
                self.len,
                mask.len(),
            ));
        }

        fn keep<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter_map(|(&v, &k)| k.then_some(v))
                .collect()
        }

        Ok(EpochTable {
            onset: self.onset.as_deref().map(|o| keep(o, mask)),
            scores: self
                .scores
                .iter()
                .map(|(&column, codes)| (column, keep(codes, mask)))
                .collect(),
            len: mask.iter().filter(|&&k| k).count(),
        })
    }
}

/// Outcome of comparing an automated score column with the consensus column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Agreement {
    /// Percentage of compared epochs where both scores are equal, in `[0, 100]`
    Scored { percent: f64, epochs_compared: usize },
    /// Headband record too noisy to score
    QualityGateFailed { artifact_rate_pct: f64 },
    /// Zero epochs left to compare after filtering
    NoEpochs,
}

impl Agreement {
    /// Agreement percentage, or `None` when there is no result
    pub fn percent(&self) -> Option<f64> {
        match self {
            Agreement::Scored { percent, .. } => Some(*percent),
            _ => None,
        }
    }

    pub fn is_gated(&self) -> bool {
        matches!(self, Agreement::QualityGateFailed { .. })
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agreement::Scored {
                percent,
                epochs_compared,
            } => write!(f, "{:.2}% ({} epochs)", percent, epochs_compared),
            Agreement::QualityGateFailed { artifact_rate_pct } => {
                write!(f, "no result (artifact rate {:.2}%)", artifact_rate_pct)
            }
            Agreement::NoEpochs => f.write_str("no result (no epochs to compare)"),
        }
    }
}

/// Duration figures for one headband record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordDuration {
    /// Epochs in the unfiltered record
    pub epochs: usize,
    /// Epochs scored as artifact
    pub artifact_epochs: usize,
    /// Hours of artifact or missing data
    pub artifact_hours: f64,
    /// Hours recorded
    pub total_hours: f64,
}

/// Everything computed for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResult {
    pub subject_id: String,
    /// Headband AI vs. consensus
    pub device_agreement: Agreement,
    /// PSG AI vs. consensus
    pub psg_agreement: Agreement,
    /// `None` for a zero-epoch headband record
    pub duration: Option<RecordDuration>,
}

impl SubjectResult {
    pub fn device_vs_consensus_pct(&self) -> Option<f64> {
        self.device_agreement.percent()
    }

    pub fn psg_vs_consensus_pct(&self) -> Option<f64> {
        self.psg_agreement.percent()
    }

    pub fn artifact_hours(&self) -> f64 {
        self.duration.map(|d| d.artifact_hours).unwrap_or(0.0)
    }

    pub fn total_hours(&self) -> f64 {
        self.duration.map(|d| d.total_hours).unwrap_or(0.0)
    }
}

/// Cohort-level mean that may be undefined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CohortMean {
    Mean { value: f64, subjects: usize },
    /// No subject produced a usable result
    NoData,
}

impl CohortMean {
    /// Arithmetic mean of `values`, or [`CohortMean::NoData`] when empty
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return CohortMean::NoData;
        }
        let sum: f64 = values.iter().sum();
        CohortMean::Mean {
            value: sum / values.len() as f64,
            subjects: values.len(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CohortMean::Mean { value, .. } => Some(*value),
            CohortMean::NoData => None,
        }
    }
}

impl fmt::Display for CohortMean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortMean::Mean { value, .. } => write!(f, "{:.2}%", value),
            CohortMean::NoData => f.write_str("no data"),
        }
    }
}

/// The reported artifact of a full run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub mean_device_agreement_pct: CohortMean,
    pub mean_psg_agreement_pct: CohortMean,
    pub total_artifact_hours: f64,
    pub total_recorded_hours: f64,
    /// Subjects whose headband comparison produced a percentage
    pub subjects_scored: usize,
    /// Subjects rejected by the quality gate
    pub subjects_gated: usize,
    /// Subjects with no epochs left to compare
    pub subjects_without_epochs: usize,
    /// Subjects that could not be loaded or aligned
    pub subjects_failed: usize,
}
