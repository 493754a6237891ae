//! Subject lookup for visual review
//!
//! Resolves a subject identifier to the time-aligned consensus / PSG-AI /
//! headband-AI series for that subject. Tables are read from disk on every
//! call and dropped before returning, so a long-running front end holds no
//! open files between lookups.

use crate::config::AnalysisConfig;
use crate::discovery::{discover_subjects, SubjectFiles};
use crate::error::ComputeError;
use crate::pipeline::{check_time_axis, AgreementProcessor};
use crate::types::{EpochTable, ScoreColumn, StageCode, SubjectResult, ONSET_HEADER};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One subject's scores on a shared time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries {
    pub subject_id: String,
    /// Epoch start, seconds
    pub onset: Vec<f64>,
    pub consensus: Vec<StageCode>,
    pub ai_psg: Vec<StageCode>,
    pub ai_hb: Vec<StageCode>,
}

impl AlignedSeries {
    /// Align a subject's unfiltered tables. The PSG table supplies the time axis.
    pub fn from_tables(
        subject_id: &str,
        device: &EpochTable,
        psg: &EpochTable,
    ) -> Result<Self, ComputeError> {
        let onset = psg.onset().ok_or_else(|| {
            ComputeError::MalformedInput(format!("required column '{}' is absent", ONSET_HEADER))
        })?;
        check_time_axis(device, psg)?;

        Ok(Self {
            subject_id: subject_id.to_string(),
            onset: onset.to_vec(),
            consensus: psg.require(ScoreColumn::Majority)?.to_vec(),
            ai_psg: psg.require(ScoreColumn::AiPsg)?.to_vec(),
            ai_hb: device.require(ScoreColumn::AiHb)?.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.onset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onset.is_empty()
    }

    /// `(onset, consensus, ai_psg)` per epoch
    pub fn psg_triples(&self) -> impl Iterator<Item = (f64, StageCode, StageCode)> + '_ {
        self.onset
            .iter()
            .zip(&self.consensus)
            .zip(&self.ai_psg)
            .map(|((&t, &c), &a)| (t, c, a))
    }

    /// `(onset, consensus, ai_hb)` per epoch
    pub fn device_triples(&self) -> impl Iterator<Item = (f64, StageCode, StageCode)> + '_ {
        self.onset
            .iter()
            .zip(&self.consensus)
            .zip(&self.ai_hb)
            .map(|((&t, &c), &a)| (t, c, a))
    }

    /// Tab-separated rendering with one row per epoch
    pub fn to_tsv(&self) -> Result<String, ComputeError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        wtr.write_record([
            ONSET_HEADER,
            ScoreColumn::Majority.header(),
            ScoreColumn::AiPsg.header(),
            ScoreColumn::AiHb.header(),
        ])?;
        for (((onset, consensus), ai_psg), ai_hb) in self
            .onset
            .iter()
            .zip(&self.consensus)
            .zip(&self.ai_psg)
            .zip(&self.ai_hb)
        {
            wtr.write_record([
                onset.to_string(),
                consensus.to_string(),
                ai_psg.to_string(),
                ai_hb.to_string(),
            ])?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| ComputeError::Csv(csv::Error::from(e.into_error())))?;
        String::from_utf8(bytes).map_err(|e| ComputeError::MalformedInput(e.to_string()))
    }
}

/// Resolves subject identifiers against a discovered cohort
#[derive(Debug, Clone)]
pub struct SubjectResolver {
    subjects: Vec<SubjectFiles>,
    processor: AgreementProcessor,
}

impl SubjectResolver {
    pub fn new(subjects: Vec<SubjectFiles>, processor: AgreementProcessor) -> Self {
        Self {
            subjects,
            processor,
        }
    }

    /// Discover the cohort under `root`
    pub fn from_directory(root: &Path, config: &AnalysisConfig) -> Result<Self, ComputeError> {
        let processor = AgreementProcessor::new(config.clone())?;
        let subjects = discover_subjects(root, config)?;
        Ok(Self::new(subjects, processor))
    }

    pub fn subject_ids(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(|s| s.subject_id.as_str())
    }

    /// Find a subject by `10` or `sub-10`, or by a listed id verbatim
    pub fn find(&self, subject_id: &str) -> Option<&SubjectFiles> {
        let trimmed = subject_id.trim();
        let stripped = trimmed.strip_prefix("sub-").unwrap_or(trimmed);
        if stripped.is_empty() {
            return None;
        }
        self.subjects
            .iter()
            .find(|s| s.subject_id == trimmed)
            .or_else(|| self.subjects.iter().find(|s| s.subject_id == stripped))
    }

    /// Aligned series for a subject, or [`ComputeError::SubjectNotFound`]
    pub fn resolve(&self, subject_id: &str) -> Result<AlignedSeries, ComputeError> {
        let files = self.lookup(subject_id)?;
        let (device, psg) = self.processor.load_subject(files)?;
        AlignedSeries::from_tables(&files.subject_id, &device, &psg)
    }

    /// Agreement figures for a subject, or [`ComputeError::SubjectNotFound`]
    pub fn resolve_result(&self, subject_id: &str) -> Result<SubjectResult, ComputeError> {
        let files = self.lookup(subject_id)?;
        self.processor.process_subject(files)
    }

    fn lookup(&self, subject_id: &str) -> Result<&SubjectFiles, ComputeError> {
        let files = self
            .find(subject_id)
            .ok_or_else(|| ComputeError::SubjectNotFound(subject_id.trim().to_string()))?;
        info!(subject = %files.subject_id, "found matching files");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write_subject(root: &Path, id: &str, headband: &str, psg: &str) {
        let eeg = root.join(format!("sub-{}", id)).join("eeg");
        fs::create_dir_all(&eeg).unwrap();
        fs::write(eeg.join(format!("sub-{}_task-Sleep_acq-headband_events.tsv", id)), headband)
            .unwrap();
        fs::write(eeg.join(format!("sub-{}_task-Sleep_acq-psg_events.tsv", id)), psg).unwrap();
    }

    fn codes(values: &[i32]) -> Vec<StageCode> {
        values.iter().copied().map(StageCode).collect()
    }

    fn cohort() -> (tempfile::TempDir, SubjectResolver) {
        let dir = tempfile::tempdir().unwrap();
        write_subject(
            dir.path(),
            "1",
            "onset\tai_hb\n0\t0\n30\t-2\n60\t2\n",
            "onset\tmajority\tai_psg\n0\t0\t0\n30\t1\t1\n60\t8\t2\n",
        );
        write_subject(
            dir.path(),
            "2",
            "onset\tai_hb\n0\t0\n30\t1\n",
            "onset\tmajority\tai_psg\n0\t0\t0\n",
        );
        let resolver = SubjectResolver::from_directory(dir.path(), &AnalysisConfig::default()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn test_resolve_aligned_series() {
        let (_dir, resolver) = cohort();
        let series = resolver.resolve("1").unwrap();

        assert_eq!(
            series,
            AlignedSeries {
                subject_id: "1".to_string(),
                onset: vec![0.0, 30.0, 60.0],
                consensus: codes(&[0, 1, 8]),
                ai_psg: codes(&[0, 1, 2]),
                ai_hb: codes(&[0, -2, 2]),
            }
        );
        assert_eq!(
            series.device_triples().collect::<Vec<_>>(),
            vec![
                (0.0, StageCode(0), StageCode(0)),
                (30.0, StageCode(1), StageCode(-2)),
                (60.0, StageCode(8), StageCode(2)),
            ]
        );
        assert_eq!(series.psg_triples().count(), 3);
    }

    #[test]
    fn test_resolve_accepts_prefixed_and_padded_ids() {
        let (_dir, resolver) = cohort();
        assert!(resolver.resolve("sub-1").is_ok());
        assert!(resolver.resolve("  1 ").is_ok());
    }

    #[test]
    fn test_resolve_every_listed_id() {
        let dir = tempfile::tempdir().unwrap();
        let eeg = dir.path().join("sub-abc").join("eeg");
        fs::create_dir_all(&eeg).unwrap();
        fs::write(eeg.join("headband_events.tsv"), "onset\tai_hb\n0\t1\n30\t2\n").unwrap();
        fs::write(
            eeg.join("psg_events.tsv"),
            "onset\tmajority\tai_psg\n0\t1\t1\n30\t2\t3\n",
        )
        .unwrap();

        let resolver = SubjectResolver::from_directory(dir.path(), &AnalysisConfig::default()).unwrap();
        let ids: Vec<&str> = resolver.subject_ids().collect();
        assert_eq!(ids, vec!["sub-abc"]);

        for id in ids {
            let series = resolver.resolve(id).unwrap();
            assert_eq!(series.subject_id, "sub-abc");
            assert_eq!(series.len(), 2);
        }
        assert!(resolver.resolve(" sub-abc ").is_ok());
    }

    #[test]
    fn test_not_found() {
        let (_dir, resolver) = cohort();
        assert!(matches!(
            resolver.resolve("999"),
            Err(ComputeError::SubjectNotFound(id)) if id == "999"
        ));
        assert!(matches!(resolver.resolve(""), Err(ComputeError::SubjectNotFound(_))));
        assert!(matches!(resolver.resolve("   "), Err(ComputeError::SubjectNotFound(_))));
    }

    #[test]
    fn test_misaligned_subject_reports_alignment_error() {
        let (_dir, resolver) = cohort();
        assert!(matches!(
            resolver.resolve("2"),
            Err(ComputeError::Alignment { .. })
        ));
    }

    #[test]
    fn test_resolve_result() {
        let (_dir, resolver) = cohort();
        let result = resolver.resolve_result("1").unwrap();
        // After exclusion: ai_hb [0, -2] vs [0, 1], 50% artifacts -> gated
        assert!(result.device_agreement.is_gated());
        assert_eq!(result.psg_vs_consensus_pct(), Some(100.0));
    }

    #[test]
    fn test_repeated_lookups() {
        let (_dir, resolver) = cohort();
        for _ in 0..50 {
            assert_eq!(resolver.resolve("1").unwrap().len(), 3);
        }
        assert_eq!(resolver.subject_ids().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_to_tsv() {
        let (_dir, resolver) = cohort();
        let tsv = resolver.resolve("1").unwrap().to_tsv().unwrap();
        assert_eq!(
            tsv,
            "onset\tmajority\tai_psg\tai_hb\n0\t0\t0\t0\n30\t1\t1\t-2\n60\t8\t2\t2\n"
        );
    }

    #[test]
    fn test_psg_without_onset() {
        let device = EpochTable::from_parts(None, vec![(ScoreColumn::AiHb, codes(&[1]))]).unwrap();
        let psg = EpochTable::from_parts(
            None,
            vec![
                (ScoreColumn::Majority, codes(&[1])),
                (ScoreColumn::AiPsg, codes(&[1])),
            ],
        )
        .unwrap();
        assert!(matches!(
            AlignedSeries::from_tables("1", &device, &psg),
            Err(ComputeError::MalformedInput(_))
        ));
    }
}
