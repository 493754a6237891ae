//! Cohort report encoding
//!
//! Wraps a finished [`CohortRun`] with provenance (producer, run id, time of
//! computation, configuration) for JSON output, and renders the plain-text
//! summary printed by the CLI.

use crate::cohort::{CohortRun, SubjectFailure};
use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::types::{CohortMean, CohortSummary, SubjectResult};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Externally reported artifact of a cohort run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub run_id: Uuid,
    pub generated_at_utc: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub summary: CohortSummary,
    pub subjects: Vec<SubjectResult>,
    pub failures: Vec<SubjectFailure>,
}

/// Encoder producing [`CohortReport`]s
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, run: &CohortRun, config: &AnalysisConfig) -> CohortReport {
        CohortReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            run_id: Uuid::new_v4(),
            generated_at_utc: Utc::now(),
            config: config.clone(),
            summary: run.summary(),
            subjects: run.results().to_vec(),
            failures: run.failures().to_vec(),
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(
        &self,
        run: &CohortRun,
        config: &AnalysisConfig,
    ) -> Result<String, ComputeError> {
        let report = self.encode(run, config);
        serde_json::to_string_pretty(&report).map_err(ComputeError::Json)
    }
}

/// Plain-text cohort summary, one finding per line
pub fn render_summary(summary: &CohortSummary) -> String {
    let mut out = String::new();

    let _ = match summary.mean_device_agreement_pct {
        CohortMean::Mean { value, subjects } => writeln!(
            out,
            "We found {:.2}% match between the headband AI and the majority ({} subjects)",
            value, subjects
        ),
        CohortMean::NoData => writeln!(
            out,
            "No data: no subject produced a usable headband AI comparison"
        ),
    };
    let _ = match summary.mean_psg_agreement_pct {
        CohortMean::Mean { value, subjects } => writeln!(
            out,
            "We found {:.2}% match between the PSG AI and the majority ({} subjects)",
            value, subjects
        ),
        CohortMean::NoData => writeln!(out, "No data: no subject produced a usable PSG AI comparison"),
    };
    let _ = writeln!(
        out,
        "There were {:.2} hours of missing data out of a total of {:.2} hours collected in the headband experiment",
        summary.total_artifact_hours, summary.total_recorded_hours
    );
    if summary.subjects_gated > 0 || summary.subjects_without_epochs > 0 || summary.subjects_failed > 0 {
        let _ = writeln!(
            out,
            "Excluded from the headband mean: {} over the artifact threshold, {} without epochs, {} failed to load",
            summary.subjects_gated, summary.subjects_without_epochs, summary.subjects_failed
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agreement, RecordDuration};

    fn sample_run() -> CohortRun {
        let mut run = CohortRun::new();
        run.record(SubjectResult {
            subject_id: "10".to_string(),
            device_agreement: Agreement::Scored {
                percent: 82.5,
                epochs_compared: 800,
            },
            psg_agreement: Agreement::Scored {
                percent: 88.0,
                epochs_compared: 850,
            },
            duration: Some(RecordDuration {
                epochs: 900,
                artifact_epochs: 60,
                artifact_hours: 0.5,
                total_hours: 7.5,
            }),
        });
        run.record(SubjectResult {
            subject_id: "20".to_string(),
            device_agreement: Agreement::QualityGateFailed {
                artifact_rate_pct: 61.0,
            },
            psg_agreement: Agreement::Scored {
                percent: 90.0,
                epochs_compared: 850,
            },
            duration: None,
        });
        run
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let json = encoder
            .encode_to_json(&sample_run(), &AnalysisConfig::default())
            .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["producer"]["instance_id"], "test-instance");
        assert_eq!(payload["config"]["quality_gate_threshold_pct"], 40.0);
        assert_eq!(payload["summary"]["mean_device_agreement_pct"]["status"], "mean");
        assert_eq!(payload["summary"]["mean_device_agreement_pct"]["value"], 82.5);
        assert_eq!(payload["summary"]["mean_psg_agreement_pct"]["value"], 89.0);
        assert_eq!(payload["subjects"][1]["device_agreement"]["status"], "quality_gate_failed");
        assert!(payload["run_id"].is_string());
    }

    #[test]
    fn test_report_roundtrip() {
        let report = ReportEncoder::new().encode(&sample_run(), &AnalysisConfig::default());
        let json = serde_json::to_string(&report).unwrap();
        let loaded: CohortReport = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&sample_run().summary());
        assert!(text.contains("We found 82.50% match between the headband AI and the majority (1 subjects)"));
        assert!(text.contains("We found 89.00% match between the PSG AI"));
        assert!(text.contains("0.50 hours of missing data out of a total of 7.50 hours"));
        assert!(text.contains("1 over the artifact threshold"));
    }

    #[test]
    fn test_render_no_data() {
        let text = render_summary(&CohortRun::new().summary());
        assert!(text.contains("No data: no subject produced a usable headband AI comparison"));
        assert!(!text.contains("NaN"));
    }
}
