use crate::core::disposal::DisposalRecord;
use crate::core::pipeline::RunSummary;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        root: PathBuf,
        threshold: u32,
        mode: String,
        disposal: String,
        dry_run: bool,
    },
    DecodeFailed {
        path: PathBuf,
        error: String,
    },
    GroupFound {
        group: usize,
        members: Vec<PathBuf>,
    },
    GroupKept {
        group: usize,
    },
    GroupSkipped {
        group: usize,
        reason: String,
    },
    RemovalPlanned {
        group: usize,
        path: PathBuf,
        kept: Vec<PathBuf>,
    },
    Disposal {
        group: usize,
        #[serde(flatten)]
        record: DisposalRecord,
    },
    Restored {
        path: PathBuf,
        from: PathBuf,
    },
    RestoreFailed {
        path: PathBuf,
        error: String,
    },
    RunAborted {
        reason: String,
    },
    RunFinished(RunSummary),
}

/// Append-only run log, one JSON object per line.
///
/// Every entry is flushed as soon as it is written, and the writer is
/// flushed again on drop, so an aborted run still leaves a complete log.
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log {:?}", path))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to write run log {:?}", self.path))
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("Failed to flush run log {:?}: {}", self.path, e);
        }
    }
}

/// Read every well-formed entry of a run log; malformed lines are skipped.
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let file =
        File::open(path).with_context(|| format!("Could not open run log {:?}", path))?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => log::warn!("Skipping malformed log line {}: {}", i + 1, err),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disposal::DisposalAction;
    use tempfile::TempDir;

    #[test]
    fn test_entries_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs").join("run.jsonl");

        {
            let mut log = RunLog::open(&log_path).unwrap();
            log.record(LogEvent::GroupFound {
                group: 1,
                members: vec![PathBuf::from("/a.jpg"), PathBuf::from("/b.jpg")],
            })
            .unwrap();
            log.record(LogEvent::Disposal {
                group: 1,
                record: DisposalRecord {
                    path: PathBuf::from("/b.jpg"),
                    action: DisposalAction::Trashed {
                        destination: PathBuf::from("/trash/b.jpg"),
                        digest: Some("abc".to_string()),
                    },
                },
            })
            .unwrap();
        }

        let entries = read_entries(&log_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].event, LogEvent::GroupFound { group: 1, .. }));
        let LogEvent::Disposal { group, record } = &entries[1].event else {
            panic!("expected disposal, got {:?}", entries[1].event);
        };
        assert_eq!(*group, 1);
        assert_eq!(record.path, PathBuf::from("/b.jpg"));
    }

    #[test]
    fn test_log_is_append_only_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("run.jsonl");

        for reason in ["first", "second"] {
            let mut log = RunLog::open(&log_path).unwrap();
            log.record(LogEvent::RunAborted {
                reason: reason.to_string(),
            })
            .unwrap();
        }

        let reasons: Vec<String> = read_entries(&log_path)
            .unwrap()
            .into_iter()
            .filter_map(|entry| match entry.event {
                LogEvent::RunAborted { reason } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec!["first", "second"]);
    }

    #[test]
    fn test_line_format() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("run.jsonl");
        let mut log = RunLog::open(&log_path).unwrap();
        log.record(LogEvent::DecodeFailed {
            path: PathBuf::from("/bad.png"),
            error: "not an image".to_string(),
        })
        .unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["event"], "decode_failed");
        assert_eq!(value["path"], "/bad.png");
        assert!(value["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("run.jsonl");
        fs::write(
            &log_path,
            "garbage\n\n{\"timestamp\":\"t\",\"event\":\"group_kept\",\"group\":3}\n",
        )
        .unwrap();

        let entries = read_entries(&log_path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, LogEvent::GroupKept { group: 3 });
    }
}
