//! Agreement scoring
//!
//! Position-wise comparison of an automated score column against the consensus
//! column, over epochs that survived the exclusion filter.
//! - Headband: quality gate first, then artifact epochs are dropped (they are
//!   missing data, not disagreements)
//! - PSG: compared as-is

use crate::error::ComputeError;
use crate::filter::{ArtifactFilter, FilteredPair};
use crate::quality::{GateOutcome, QualityGate};
use crate::types::{Agreement, Modality, ScoreColumn};

/// Scorer for automated vs. consensus agreement
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementScorer {
    gate: QualityGate,
}

impl AgreementScorer {
    pub fn new(gate: QualityGate) -> Self {
        Self { gate }
    }

    /// Score a consensus-filtered pair for the given modality
    pub fn score(&self, modality: Modality, pair: &FilteredPair) -> Result<Agreement, ComputeError> {
        match modality {
            Modality::Headband => self.device_vs_consensus(pair),
            Modality::Psg => self.psg_vs_consensus(pair),
        }
    }

    /// Headband AI vs. consensus.
    ///
    /// Records failing the quality gate yield [`Agreement::QualityGateFailed`],
    /// never a percentage.
    pub fn device_vs_consensus(&self, pair: &FilteredPair) -> Result<Agreement, ComputeError> {
        let column = Modality::Headband.score_column();
        match self.gate.assess(&pair.automated, column)? {
            GateOutcome::Empty => return Ok(Agreement::NoEpochs),
            GateOutcome::Fail { artifact_rate_pct } => {
                return Ok(Agreement::QualityGateFailed { artifact_rate_pct })
            }
            GateOutcome::Pass { .. } => {}
        }

        let cleaned = ArtifactFilter::apply(pair, column)?;
        Self::match_rate(&cleaned, column)
    }

    /// PSG AI vs. consensus. No artifact handling on this path.
    pub fn psg_vs_consensus(&self, pair: &FilteredPair) -> Result<Agreement, ComputeError> {
        Self::match_rate(pair, Modality::Psg.score_column())
    }

    /// Share of epochs where `column` equals the consensus, in percent
    pub fn match_rate(pair: &FilteredPair, column: ScoreColumn) -> Result<Agreement, ComputeError> {
        let automated = pair.automated.require(column)?;
        let consensus = pair.consensus.require(ScoreColumn::Majority)?;

        if automated.len() != consensus.len() {
            return Err(ComputeError::length_mismatch(
                "agreement scoring",
                automated.len(),
                consensus.len(),
            ));
        }
        if consensus.is_empty() {
            return Ok(Agreement::NoEpochs);
        }

        let matches = automated
            .iter()
            .zip(consensus)
            .filter(|(a, c)| a == c)
            .count();

        Ok(Agreement::Scored {
            percent: matches as f64 / consensus.len() as f64 * 100.0,
            epochs_compared: consensus.len(),
        })
    }
}
