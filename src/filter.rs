//! Epoch filtering
//!
//! Removes epochs carrying a reserved code from a pair of row-aligned tables,
//! applying the same keep-mask to both sides so position-wise comparison stays
//! valid.
//! - Exclusion: consensus epochs scored [`StageCode::UNSCORED`](crate::types::StageCode::UNSCORED)
//! - Artifact drop: headband epochs scored [`StageCode::ARTIFACT`](crate::types::StageCode::ARTIFACT)

use crate::error::ComputeError;
use crate::types::{EpochTable, ScoreColumn};
use tracing::debug;

/// Two row-aligned tables: automated scores and the consensus they are judged against.
///
/// For PSG comparisons both sides are the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPair {
    pub automated: EpochTable,
    pub consensus: EpochTable,
}

impl FilteredPair {
    /// Number of epochs on each side
    pub fn len(&self) -> usize {
        self.consensus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_aligned(&self, stage: &'static str) -> Result<(), ComputeError> {
        if self.automated.len() != self.consensus.len() {
            return Err(ComputeError::length_mismatch(
                stage,
                self.automated.len(),
                self.consensus.len(),
            ));
        }
        Ok(())
    }

    fn retain(&self, mask: &[bool], stage: &'static str) -> Result<FilteredPair, ComputeError> {
        let pair = FilteredPair {
            automated: self.automated.retain(mask)?,
            consensus: self.consensus.retain(mask)?,
        };
        pair.check_aligned(stage)?;
        Ok(pair)
    }
}

/// Filter for unscored (disconnection) epochs
pub struct ExclusionFilter;

impl ExclusionFilter {
    /// Drop every epoch whose consensus score is [`StageCode::UNSCORED`](crate::types::StageCode::UNSCORED).
    ///
    /// Both tables must describe the same epochs; a length mismatch is reported
    /// as an alignment error rather than truncated. A result with zero epochs is
    /// valid and left for the scorer to report.
    pub fn apply(
        automated: &EpochTable,
        consensus: &EpochTable,
    ) -> Result<FilteredPair, ComputeError> {
        if automated.len() != consensus.len() {
            return Err(ComputeError::length_mismatch(
                "exclusion filter",
                automated.len(),
                consensus.len(),
            ));
        }

        let mask: Vec<bool> = consensus
            .require(ScoreColumn::Majority)?
            .iter()
            .map(|code| !code.is_unscored())
            .collect();

        let filtered = FilteredPair {
            automated: automated.retain(&mask)?,
            consensus: consensus.retain(&mask)?,
        };
        filtered.check_aligned("exclusion filter")?;
        debug!(
            before = consensus.len(),
            after = filtered.len(),
            "excluded unscored epochs"
        );
        Ok(filtered)
    }
}

/// Filter for headband artifact epochs
pub struct ArtifactFilter;

impl ArtifactFilter {
    /// Drop every epoch whose automated score in `column` is [`StageCode::ARTIFACT`](crate::types::StageCode::ARTIFACT),
    /// and the matching consensus epochs.
    pub fn apply(pair: &FilteredPair, column: ScoreColumn) -> Result<FilteredPair, ComputeError> {
        let mask: Vec<bool> = pair
            .automated
            .require(column)?
            .iter()
            .map(|code| !code.is_artifact())
            .collect();

        let filtered = pair.retain(&mask, "artifact filter")?;
        debug!(
            before = pair.len(),
            after = filtered.len(),
            "dropped artifact epochs"
        );
        Ok(filtered)
    }
}
