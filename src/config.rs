//! Analysis configuration
//!
//! All fields have defaults, so an empty TOML document is a valid configuration.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default epoch length in seconds
pub const DEFAULT_EPOCH_DURATION_SECONDS: f64 = 30.0;

/// Default inclusive artifact-rate ceiling for the quality gate (percent)
pub const DEFAULT_QUALITY_GATE_THRESHOLD_PCT: f64 = 40.0;

/// How the total recorded duration is derived from the epoch count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalDurationPolicy {
    /// `(epochs - 1) * epoch_duration`. Matches historical cohort figures,
    /// which undercount every record by one epoch.
    #[default]
    DiscountFirstEpoch,
    /// `epochs * epoch_duration`
    AllEpochs,
}

/// Tunables shared by every stage of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub epoch_duration_seconds: f64,
    pub quality_gate_threshold_pct: f64,
    pub total_duration: TotalDurationPolicy,
    /// File-name suffix of headband event tables
    pub headband_suffix: String,
    /// File-name suffix of PSG event tables
    pub psg_suffix: String,
    /// Per-subject subdirectory holding the event tables
    pub recording_dir: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epoch_duration_seconds: DEFAULT_EPOCH_DURATION_SECONDS,
            quality_gate_threshold_pct: DEFAULT_QUALITY_GATE_THRESHOLD_PCT,
            total_duration: TotalDurationPolicy::default(),
            headband_suffix: "headband_events.tsv".to_string(),
            psg_suffix: "psg_events.tsv".to_string(),
            recording_dir: "eeg".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ComputeError> {
        let config: AnalysisConfig =
            toml::from_str(toml_str).map_err(|e| ComputeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ComputeError::input_not_found(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.epoch_duration_seconds.is_finite() && self.epoch_duration_seconds > 0.0) {
            return Err(ComputeError::Config(format!(
                "epoch_duration_seconds must be positive, got {}",
                self.epoch_duration_seconds
            )));
        }
        if !(self.quality_gate_threshold_pct > 0.0 && self.quality_gate_threshold_pct <= 100.0) {
            return Err(ComputeError::Config(format!(
                "quality_gate_threshold_pct must be in (0, 100], got {}",
                self.quality_gate_threshold_pct
            )));
        }
        if self.headband_suffix.is_empty() || self.psg_suffix.is_empty() {
            return Err(ComputeError::Config("file suffixes must not be empty".to_string()));
        }
        if self.headband_suffix == self.psg_suffix {
            return Err(ComputeError::Config(
                "headband_suffix and psg_suffix must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ComputeError> {
        toml::to_string(self).map_err(|e| ComputeError::Config(e.to_string()))
    }
}
