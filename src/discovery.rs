//! Subject file discovery
//!
//! Finds matched headband/PSG event tables in a cohort directory laid out as
//! `<root>/<subject>/<recording_dir>/*{headband_suffix,psg_suffix}`.
//! Only complete pairs are returned.

use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Matched pair of event tables for one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFiles {
    pub subject_id: String,
    pub headband: PathBuf,
    pub psg: PathBuf,
}

/// Subject number from a file name such as `sub-10_task-Sleep_acq-psg_events.tsv`
pub fn subject_id_from_file_name(file_name: &str) -> Option<String> {
    let rest = file_name.strip_prefix("sub-")?;
    let (digits, _) = rest.split_once('_')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits.to_string())
}

/// Scan `root` for subjects with both event tables present.
///
/// Subjects are returned sorted by directory name. Incomplete pairs are logged
/// and skipped.
pub fn discover_subjects(
    root: &Path,
    config: &AnalysisConfig,
) -> Result<Vec<SubjectFiles>, ComputeError> {
    if !root.is_dir() {
        return Err(ComputeError::input_not_found(
            root,
            io::Error::new(io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut subjects = Vec::new();
    for subject_dir in sorted_entries(root).map_err(|e| ComputeError::input_not_found(root, e))? {
        if !subject_dir.is_dir() {
            continue;
        }

        let recording_dir = subject_dir.join(&config.recording_dir);
        if !recording_dir.is_dir() {
            debug!(dir = %subject_dir.display(), "no recording directory, skipping");
            continue;
        }

        match find_pair(&recording_dir, config) {
            Ok((Some(headband), Some(psg))) => {
                let subject_id = file_name(&headband)
                    .and_then(subject_id_from_file_name)
                    .or_else(|| file_name(&psg).and_then(subject_id_from_file_name))
                    .or_else(|| file_name(&subject_dir).map(str::to_string))
                    .unwrap_or_default();
                subjects.push(SubjectFiles {
                    subject_id,
                    headband,
                    psg,
                });
            }
            Ok((Some(headband), None)) => {
                warn!(file = %headband.display(), "missing PSG file, skipping");
            }
            Ok((None, Some(psg))) => {
                warn!(file = %psg.display(), "missing headband file, skipping");
            }
            Ok((None, None)) => {
                warn!(dir = %recording_dir.display(), "no event files, skipping");
            }
            Err(e) => {
                warn!(dir = %recording_dir.display(), error = %e, "cannot read recording directory, skipping");
            }
        }
    }

    debug!(root = %root.display(), subjects = subjects.len(), "discovery complete");
    Ok(subjects)
}

fn find_pair(
    recording_dir: &Path,
    config: &AnalysisConfig,
) -> io::Result<(Option<PathBuf>, Option<PathBuf>)> {
    let mut headband = None;
    let mut psg = None;

    for path in sorted_entries(recording_dir)? {
        if !path.is_file() {
            continue;
        }
        let Some(name) = file_name(&path) else {
            continue;
        };
        let slot = if name.ends_with(&config.headband_suffix) {
            &mut headband
        } else if name.ends_with(&config.psg_suffix) {
            &mut psg
        } else {
            continue;
        };
        if slot.is_some() {
            warn!(file = %path.display(), "duplicate event file, keeping the first");
            continue;
        }
        *slot = Some(path);
    }

    Ok((headband, psg))
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
