//! Epoch table loading
//!
//! Parses tab-separated event tables (header row mandatory, one row per epoch)
//! into [`EpochTable`]s. Unknown columns are ignored; the caller names the score
//! columns it cannot work without.

use crate::error::ComputeError;
use crate::types::{EpochTable, ScoreColumn, StageCode, ONSET_HEADER};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Loader for tab-separated epoch tables
pub struct EpochTableLoader;

impl EpochTableLoader {
    /// Load a table from disk.
    ///
    /// The file handle is dropped before returning.
    pub fn load_path(path: &Path, required: &[ScoreColumn]) -> Result<EpochTable, ComputeError> {
        let file = File::open(path).map_err(|e| ComputeError::input_not_found(path, e))?;
        let table = Self::load_reader(file, required).map_err(|e| match e {
            ComputeError::MalformedInput(msg) => {
                ComputeError::MalformedInput(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        debug!(path = %path.display(), epochs = table.len(), "loaded epoch table");
        Ok(table)
    }

    /// Parse a table held in memory
    pub fn parse_str(tsv: &str, required: &[ScoreColumn]) -> Result<EpochTable, ComputeError> {
        Self::load_reader(tsv.as_bytes(), required)
    }

    /// Parse a table from any reader
    pub fn load_reader<R: Read>(
        reader: R,
        required: &[ScoreColumn],
    ) -> Result<EpochTable, ComputeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();

        let mut onset_idx: Option<usize> = None;
        let mut score_idx: BTreeMap<ScoreColumn, usize> = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if header == ONSET_HEADER {
                if onset_idx.replace(idx).is_some() {
                    return Err(duplicate_column(header));
                }
            } else if let Some(column) = ScoreColumn::from_header(header) {
                if score_idx.insert(column, idx).is_some() {
                    return Err(duplicate_column(header));
                }
            }
        }

        for column in required {
            if !score_idx.contains_key(column) {
                return Err(ComputeError::MalformedInput(format!(
                    "required column '{}' is absent",
                    column
                )));
            }
        }

        let mut onset: Option<Vec<f64>> = onset_idx.map(|_| Vec::new());
        let mut scores: BTreeMap<ScoreColumn, Vec<StageCode>> =
            score_idx.keys().map(|&c| (c, Vec::new())).collect();

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            // Header is line 1
            let line = row + 2;

            if let (Some(idx), Some(values)) = (onset_idx, onset.as_mut()) {
                let value = parse_onset(field(&record, idx), line)?;
                if let Some(&previous) = values.last() {
                    if value < previous {
                        return Err(ComputeError::MalformedInput(format!(
                            "line {}: onset {} precedes previous onset {}",
                            line, value, previous
                        )));
                    }
                }
                values.push(value);
            }

            for (&column, &idx) in &score_idx {
                let code = parse_stage_code(field(&record, idx), column, line)?;
                if let Some(codes) = scores.get_mut(&column) {
                    codes.push(code);
                }
            }
        }

        EpochTable::from_parts(onset, scores)
    }
}

fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn duplicate_column(header: &str) -> ComputeError {
    ComputeError::MalformedInput(format!("column '{}' appears more than once", header))
}

fn parse_onset(raw: &str, line: usize) -> Result<f64, ComputeError> {
    let value: f64 = raw.parse().map_err(|_| {
        ComputeError::MalformedInput(format!("line {}: invalid onset '{}'", line, raw))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ComputeError::MalformedInput(format!(
            "line {}: onset must be a non-negative number, got '{}'",
            line, raw
        )));
    }
    Ok(value)
}

/// Integer codes may be written as floats (`2.0`) by some exporters.
fn parse_stage_code(raw: &str, column: ScoreColumn, line: usize) -> Result<StageCode, ComputeError> {
    if let Ok(code) = raw.parse::<i32>() {
        return Ok(StageCode(code));
    }
    match raw.parse::<f64>() {
        Ok(value)
            if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 =>
        {
            Ok(StageCode(value as i32))
        }
        _ => Err(ComputeError::MalformedInput(format!(
            "line {}: invalid stage code '{}' in column '{}'",
            line, raw, column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn codes(values: &[i32]) -> Vec<StageCode> {
        values.iter().copied().map(StageCode).collect()
    }

    #[test]
    fn test_parse_psg_table() {
        let tsv = "onset\tduration\tmajority\tai_psg\n\
                   0\t30\t0\t0\n\
                   30\t30\t1\t2\n\
                   60\t30\t8\t2\n";
        let table =
            EpochTableLoader::parse_str(tsv, &[ScoreColumn::Majority, ScoreColumn::AiPsg]).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.onset(), Some(&[0.0, 30.0, 60.0][..]));
        assert_eq!(table.column(ScoreColumn::Majority), Some(&codes(&[0, 1, 8])[..]));
        assert_eq!(table.column(ScoreColumn::AiPsg), Some(&codes(&[0, 2, 2])[..]));
        assert!(!table.has_column(ScoreColumn::AiHb));
    }

    #[test]
    fn test_missing_required_column() {
        let tsv = "missing_column\n-2\n0\n";
        let result = EpochTableLoader::parse_str(tsv, &[ScoreColumn::AiHb]);
        match result {
            Err(ComputeError::MalformedInput(msg)) => assert!(msg.contains("ai_hb")),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = EpochTableLoader::parse_str("ai_hb\n", &[ScoreColumn::AiHb]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column(ScoreColumn::AiHb), Some(&[][..]));
    }

    #[test]
    fn test_completely_empty_source_lacks_columns() {
        let result = EpochTableLoader::parse_str("", &[ScoreColumn::Majority]);
        assert!(matches!(result, Err(ComputeError::MalformedInput(_))));
    }

    #[test]
    fn test_float_encoded_codes() {
        let table = EpochTableLoader::parse_str("ai_hb\n2.0\n-2.0\n", &[ScoreColumn::AiHb]).unwrap();
        assert_eq!(table.column(ScoreColumn::AiHb), Some(&codes(&[2, -2])[..]));
    }

    #[test]
    fn test_rejects_non_integer_code() {
        let result = EpochTableLoader::parse_str("ai_hb\n1\n2.5\n", &[ScoreColumn::AiHb]);
        match result {
            Err(ComputeError::MalformedInput(msg)) => assert!(msg.contains("line 3")),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
        assert!(EpochTableLoader::parse_str("ai_hb\nW\n", &[ScoreColumn::AiHb]).is_err());
    }

    #[test]
    fn test_rejects_decreasing_or_negative_onset() {
        let decreasing = "onset\tmajority\n0\t1\n60\t1\n30\t1\n";
        assert!(EpochTableLoader::parse_str(decreasing, &[ScoreColumn::Majority]).is_err());

        let negative = "onset\tmajority\n-30\t1\n";
        assert!(EpochTableLoader::parse_str(negative, &[ScoreColumn::Majority]).is_err());

        let repeated = "onset\tmajority\n0\t1\n0\t2\n";
        assert!(EpochTableLoader::parse_str(repeated, &[ScoreColumn::Majority]).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_column() {
        let tsv = "majority\tmajority\n1\t1\n";
        assert!(matches!(
            EpochTableLoader::parse_str(tsv, &[]),
            Err(ComputeError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_ragged_row_is_tsv_error() {
        let tsv = "onset\tmajority\n0\t1\n30\n";
        assert!(matches!(
            EpochTableLoader::parse_str(tsv, &[ScoreColumn::Majority]),
            Err(ComputeError::Csv(_))
        ));
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "onset\tai_hb\n0\t1\n30\t-2\n").unwrap();

        let table = EpochTableLoader::load_path(file.path(), &[ScoreColumn::AiHb]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.count(ScoreColumn::AiHb, StageCode::ARTIFACT), 1);
    }

    #[test]
    fn test_load_missing_path() {
        let result =
            EpochTableLoader::load_path(Path::new("/nonexistent/sub-1_events.tsv"), &[]);
        assert!(matches!(result, Err(ComputeError::InputNotFound { .. })));
    }
}
