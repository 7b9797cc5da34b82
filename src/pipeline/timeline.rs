// pipeline/timeline.rs
//
// Global-time stitching and the append-only JSONL session log.
//
// Correct global times require every chunk to share the same nominal
// duration and to partition the session without gaps; no drift correction
// is applied.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use super::types::TimelineRecord;
use crate::assignment::AttributedSegment;

/// Map a chunk-local time onto the session timeline.
pub fn global_time(chunk_index: u64, chunk_duration_secs: f64, local_time: f64) -> f64 {
    let value = chunk_index as f64 * chunk_duration_secs + local_time;
    (value * 100.0).round() / 100.0
}

/// Build the persisted records for one chunk's attributed segments.
pub fn stitch_records(
    chunk_index: u64,
    chunk_duration_secs: f64,
    segments: &[AttributedSegment],
) -> Vec<TimelineRecord> {
    segments
        .iter()
        .map(|segment| TimelineRecord {
            chunk: chunk_index,
            speaker: segment.speaker.clone(),
            start: global_time(chunk_index, chunk_duration_secs, segment.start),
            end: global_time(chunk_index, chunk_duration_secs, segment.end),
            text: segment.text.clone(),
        })
        .collect()
}

/// Sort records into session-chronological order by global start time.
/// The sort is stable, so records with equal starts keep processing order.
pub fn sort_chronological(records: &mut [TimelineRecord]) {
    records.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Append-only JSONL log of every attributed segment, written in
/// processing order (not global-time order). Owned and written exclusively
/// by the session worker; readers only ever see whole appended lines.
pub struct TimelineLog {
    path: PathBuf,
}

impl TimelineLog {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one JSON line per record.
    pub fn append(&self, records: &[TimelineRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open timeline log {}", self.path.display()))?;

        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{}", line)?;
        }

        Ok(())
    }

    /// Read back every record in processing (append) order.
    pub fn read_all(&self) -> Result<Vec<TimelineRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open timeline log {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed timeline line: {}", e),
            }
        }

        Ok(records)
    }

    /// Discard all persisted records (session reset).
    pub fn truncate(&self) -> Result<()> {
        if self.path.exists() {
            File::create(&self.path)
                .with_context(|| format!("Failed to truncate timeline log {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AttributedSegment;

    fn record(chunk: u64, start: f64, text: &str) -> TimelineRecord {
        TimelineRecord {
            chunk,
            speaker: "SPK_0".to_string(),
            start,
            end: start + 1.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_global_time_formula() {
        assert_eq!(global_time(0, 30.0, 12.5), 12.5);
        assert_eq!(global_time(3, 30.0, 12.5), 102.5);
        assert_eq!(global_time(2, 10.0, 0.0), 20.0);
    }

    #[test]
    fn test_stitch_records() {
        let segments = vec![AttributedSegment {
            start: 1.5,
            end: 4.0,
            speaker: "SPK_1".to_string(),
            text: "hi".to_string(),
        }];

        let records = stitch_records(2, 30.0, &segments);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chunk, 2);
        assert_eq!(records[0].start, 61.5);
        assert_eq!(records[0].end, 64.0);
        assert_eq!(records[0].speaker, "SPK_1");
    }

    #[test]
    fn test_sort_restores_chronology_across_processing_order() {
        // chunks processed 2, 0, 1: appended out of chronological order
        let mut records = vec![record(2, 60.0, "c"), record(0, 0.0, "a"), record(1, 30.0, "b")];

        sort_chronological(&mut records);

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("partial_result.jsonl")).unwrap();

        log.append(&[record(0, 0.0, "first")]).unwrap();
        log.append(&[record(1, 30.0, "second")]).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "first");
        assert_eq!(records[1].text, "second");
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("never_written.jsonl")).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_truncate_discards_records() {
        let dir = tempfile::tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("log.jsonl")).unwrap();

        log.append(&[record(0, 0.0, "gone")]).unwrap();
        log.truncate().unwrap();

        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let log = TimelineLog::new(path.clone()).unwrap();

        log.append(&[record(0, 0.0, "good")]).unwrap();
        std::fs::write(
            &path,
            format!(
                "{}\nnot json\n",
                serde_json::to_string(&record(0, 0.0, "good")).unwrap()
            ),
        )
        .unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }
}
