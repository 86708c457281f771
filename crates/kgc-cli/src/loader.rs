//! Record loader
//!
//! Normalizes line-delimited JSON input into [`Record`] values. One JSON
//! object per line, `id` and `text` required, every other field carried
//! through untouched. Blank lines are skipped; records with empty text are
//! kept and flow through the pipeline's empty-input path.

use std::path::Path;

use anyhow::{Context, Result};

use kgc_extract::Record;

/// Load records from a JSONL file.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line).with_context(|| {
            format!("invalid record on line {} of {}", line_no + 1, path.display())
        })?;
        records.push(record);
    }

    tracing::info!(records = records.len(), input = %path.display(), "loaded records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_records_skips_blank_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.jsonl");
        fs::write(
            &path,
            "{\"id\": \"a\", \"text\": \"Alice knows Bob.\"}\n\n{\"id\": \"b\", \"text\": \"\", \"source\": \"x\"}\n",
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].extra.get("source").unwrap(), "x");
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.jsonl");
        fs::write(&path, "{\"id\": \"a\", \"text\": \"ok\"}\nnot json\n").unwrap();

        let err = load_records(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
