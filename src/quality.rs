//! Quality gate
//!
//! Decides whether a headband record carries enough real data to be scored.

use crate::config::DEFAULT_QUALITY_GATE_THRESHOLD_PCT;
use crate::error::ComputeError;
use crate::types::{EpochTable, ScoreColumn};

/// Outcome of the quality gate for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    Pass { artifact_rate_pct: f64 },
    Fail { artifact_rate_pct: f64 },
    /// No epochs, so no rate can be computed
    Empty,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, GateOutcome::Pass { .. })
    }

    pub fn artifact_rate_pct(&self) -> Option<f64> {
        match self {
            GateOutcome::Pass { artifact_rate_pct } | GateOutcome::Fail { artifact_rate_pct } => {
                Some(*artifact_rate_pct)
            }
            GateOutcome::Empty => None,
        }
    }
}

/// Artifact-rate gate; records at or above the threshold are unusable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    threshold_pct: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_GATE_THRESHOLD_PCT)
    }
}

impl QualityGate {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Percentage of epochs in `column` scored as [`StageCode::ARTIFACT`](crate::types::StageCode::ARTIFACT)
    pub fn artifact_rate(table: &EpochTable, column: ScoreColumn) -> Result<Option<f64>, ComputeError> {
        let codes = table.require(column)?;
        if codes.is_empty() {
            return Ok(None);
        }
        let artifacts = codes.iter().filter(|code| code.is_artifact()).count();
        Ok(Some(artifacts as f64 / codes.len() as f64 * 100.0))
    }

    /// Assess a (consensus-filtered) headband table
    pub fn assess(&self, table: &EpochTable, column: ScoreColumn) -> Result<GateOutcome, ComputeError> {
        Ok(match Self::artifact_rate(table, column)? {
            None => GateOutcome::Empty,
            Some(rate) if rate >= self.threshold_pct => GateOutcome::Fail {
                artifact_rate_pct: rate,
            },
            Some(rate) => GateOutcome::Pass {
                artifact_rate_pct: rate,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StageCode;

    fn device(values: &[i32]) -> EpochTable {
        EpochTable::from_parts(
            None,
            vec![(ScoreColumn::AiHb, values.iter().copied().map(StageCode).collect())],
        )
        .unwrap()
    }

    #[test]
    fn test_rate_below_threshold_passes() {
        let outcome = QualityGate::default()
            .assess(&device(&[1, 2, 3, -2, 2]), ScoreColumn::AiHb)
            .unwrap();
        assert_eq!(outcome, GateOutcome::Pass { artifact_rate_pct: 20.0 });
        assert!(outcome.passed());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // 2 of 5 = exactly 40%
        let outcome = QualityGate::default()
            .assess(&device(&[-2, -2, 1, 1, 1]), ScoreColumn::AiHb)
            .unwrap();
        assert_eq!(outcome, GateOutcome::Fail { artifact_rate_pct: 40.0 });
    }

    #[test]
    fn test_just_below_threshold_passes() {
        // 39999 of 100000 = 39.999%
        let mut values = vec![-2; 39_999];
        values.extend(std::iter::repeat(1).take(60_001));
        let outcome = QualityGate::default()
            .assess(&device(&values), ScoreColumn::AiHb)
            .unwrap();
        assert!(outcome.passed());
        assert!((outcome.artifact_rate_pct().unwrap() - 39.999).abs() < 1e-9);
    }

    #[test]
    fn test_all_artifacts_fail() {
        let outcome = QualityGate::default()
            .assess(&device(&[-2, -2, -2, -2, -2]), ScoreColumn::AiHb)
            .unwrap();
        assert_eq!(outcome, GateOutcome::Fail { artifact_rate_pct: 100.0 });
    }

    #[test]
    fn test_empty_table_is_unusable() {
        let outcome = QualityGate::default()
            .assess(&device(&[]), ScoreColumn::AiHb)
            .unwrap();
        assert_eq!(outcome, GateOutcome::Empty);
        assert!(!outcome.passed());
        assert_eq!(outcome.artifact_rate_pct(), None);
    }

    #[test]
    fn test_custom_threshold() {
        let gate = QualityGate::new(10.0);
        let outcome = gate.assess(&device(&[1, 2, 3, -2, 2]), ScoreColumn::AiHb).unwrap();
        assert!(!outcome.passed());
    }

    #[test]
    fn test_missing_column() {
        let result = QualityGate::default().assess(&device(&[1]), ScoreColumn::AiPsg);
        assert!(matches!(result, Err(ComputeError::MalformedInput(_))));
    }
}
