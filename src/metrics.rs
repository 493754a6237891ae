//! Recording duration metrics
//!
//! Artifact and total hours per headband record, computed over the full
//! unfiltered record.

use crate::config::{AnalysisConfig, TotalDurationPolicy};
use crate::error::ComputeError;
use crate::types::{EpochTable, RecordDuration, ScoreColumn, StageCode};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Deriver for per-record duration figures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationMetrics {
    epoch_duration_seconds: f64,
    policy: TotalDurationPolicy,
}

impl Default for DurationMetrics {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl DurationMetrics {
    pub fn new(epoch_duration_seconds: f64, policy: TotalDurationPolicy) -> Self {
        Self {
            epoch_duration_seconds,
            policy,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.epoch_duration_seconds, config.total_duration)
    }

    /// Duration figures for an unfiltered headband table.
    ///
    /// Returns `None` for a table with zero epochs.
    pub fn measure(&self, device: &EpochTable) -> Result<Option<RecordDuration>, ComputeError> {
        let codes = device.require(ScoreColumn::AiHb)?;
        if codes.is_empty() {
            return Ok(None);
        }

        let epochs = codes.len();
        let artifact_epochs = device.count(ScoreColumn::AiHb, StageCode::ARTIFACT);
        let counted_epochs = match self.policy {
            TotalDurationPolicy::DiscountFirstEpoch => epochs - 1,
            TotalDurationPolicy::AllEpochs => epochs,
        };

        Ok(Some(RecordDuration {
            epochs,
            artifact_epochs,
            artifact_hours: self.hours(artifact_epochs),
            total_hours: self.hours(counted_epochs),
        }))
    }

    fn hours(&self, epochs: usize) -> f64 {
        epochs as f64 * self.epoch_duration_seconds / SECONDS_PER_HOUR
    }
}
