use crate::core::disposal::{DisposalAction, move_file};
use crate::core::hash::content_digest;
use crate::core::run_log::{LogEntry, LogEvent, RunLog, read_entries};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file moved to the trash by an earlier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashedFile {
    pub index: usize,
    pub timestamp: String,
    pub original: PathBuf,
    pub destination: PathBuf,
    pub digest: Option<String>,
    pub restored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Latest,
    Record(usize),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreResult {
    Restored { original: PathBuf, from: PathBuf },
    Failed { original: PathBuf, error: String },
}

/// Every `trashed` disposal in log order, with whether a later entry restored it.
pub fn trashed_files(entries: &[LogEntry]) -> Vec<TrashedFile> {
    let mut files: Vec<TrashedFile> = Vec::new();
    let mut by_destination: HashMap<PathBuf, usize> = HashMap::new();

    for entry in entries {
        match &entry.event {
            LogEvent::Disposal { record, .. } => {
                if let DisposalAction::Trashed {
                    destination,
                    digest,
                } = &record.action
                {
                    by_destination.insert(destination.clone(), files.len());
                    files.push(TrashedFile {
                        index: files.len(),
                        timestamp: entry.timestamp.clone(),
                        original: record.path.clone(),
                        destination: destination.clone(),
                        digest: digest.clone(),
                        restored: false,
                    });
                }
            }
            LogEvent::Restored { from, .. } => {
                if let Some(&i) = by_destination.get(from) {
                    files[i].restored = true;
                    by_destination.remove(from);
                }
            }
            _ => {}
        }
    }

    files
}

pub fn list(log_path: &Path) -> Result<Vec<TrashedFile>> {
    Ok(trashed_files(&read_entries(log_path)?))
}

/// Move trashed files back to where they came from, appending the outcome to the log.
pub fn restore(log_path: &Path, selection: Selection) -> Result<Vec<RestoreResult>> {
    let files = list(log_path)?;
    let chosen: Vec<&TrashedFile> = match selection {
        Selection::All => files.iter().filter(|f| !f.restored).collect(),
        Selection::Latest => files.iter().rev().find(|f| !f.restored).into_iter().collect(),
        Selection::Record(index) => {
            let Some(file) = files.get(index) else {
                if files.is_empty() {
                    bail!("No trashed files recorded in {:?}", log_path);
                }
                bail!(
                    "Invalid history index {}; valid range is 0..={}",
                    index,
                    files.len() - 1
                );
            };
            if file.restored {
                bail!("Record {} was already restored", index);
            }
            vec![file]
        }
    };

    if chosen.is_empty() {
        bail!("Nothing to restore in {:?}", log_path);
    }

    let mut log = RunLog::open(log_path)?;
    let mut results = Vec::with_capacity(chosen.len());
    for file in chosen {
        let result = match restore_one(file) {
            Ok(()) => {
                log.record(LogEvent::Restored {
                    path: file.original.clone(),
                    from: file.destination.clone(),
                })?;
                RestoreResult::Restored {
                    original: file.original.clone(),
                    from: file.destination.clone(),
                }
            }
            Err(e) => {
                log::warn!("Could not restore {}: {:#}", file.original.display(), e);
                log.record(LogEvent::RestoreFailed {
                    path: file.original.clone(),
                    error: format!("{:#}", e),
                })?;
                RestoreResult::Failed {
                    original: file.original.clone(),
                    error: format!("{:#}", e),
                }
            }
        };
        results.push(result);
    }
    Ok(results)
}

fn restore_one(file: &TrashedFile) -> Result<()> {
    if !file.destination.exists() {
        bail!("{:?} is no longer in the trash", file.destination);
    }
    if file.original.exists() {
        bail!("{:?} already exists; not overwriting", file.original);
    }
    if let Some(expected) = &file.digest {
        let actual = content_digest(&file.destination)
            .with_context(|| format!("Failed to read {:?}", file.destination))?;
        if &actual != expected {
            bail!("{:?} changed since it was trashed", file.destination);
        }
    }
    if let Some(parent) = file.original.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    move_file(&file.destination, &file.original).with_context(|| {
        format!(
            "Failed to restore {:?} → {:?}",
            file.destination, file.original
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disposal::{DisposalMode, Disposer};
    use crate::core::fingerprint::Fingerprint;
    use crate::core::image::ImageRecord;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        log_path: PathBuf,
        originals: Vec<PathBuf>,
    }

    fn trash_files(names: &[&str]) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        let trash = temp_dir.path().join("trash");
        let log_path = temp_dir.path().join("run.jsonl");
        fs::create_dir_all(&root).unwrap();

        let disposer = Disposer::new(DisposalMode::Trash(trash));
        let mut log = RunLog::open(&log_path).unwrap();
        let mut originals = Vec::new();
        for name in names {
            let path = root.join(name);
            fs::write(&path, name.as_bytes()).unwrap();
            let record = disposer.dispose(&ImageRecord::new(&path, Fingerprint::new(0), 1));
            log.record(LogEvent::Disposal { group: 1, record }).unwrap();
            originals.push(path);
        }

        Fixture {
            _temp_dir: temp_dir,
            log_path,
            originals,
        }
    }

    #[test]
    fn test_list_trashed_files() {
        let fixture = trash_files(&["a.jpg", "b.jpg"]);
        let files = list(&fixture.log_path).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].index, 0);
        assert_eq!(files[1].original, fixture.originals[1]);
        assert!(files.iter().all(|f| !f.restored && f.digest.is_some()));
    }

    #[test]
    fn test_restore_latest_then_all() {
        let fixture = trash_files(&["a.jpg", "b.jpg", "c.jpg"]);

        let results = restore(&fixture.log_path, Selection::Latest).unwrap();
        assert!(matches!(&results[..], [RestoreResult::Restored { .. }]));
        assert!(fixture.originals[2].exists());
        assert!(!fixture.originals[0].exists());

        let results = restore(&fixture.log_path, Selection::All).unwrap();
        assert_eq!(results.len(), 2);
        assert!(fixture.originals.iter().all(|p| p.exists()));
        assert_eq!(fs::read(&fixture.originals[0]).unwrap(), b"a.jpg");

        let files = list(&fixture.log_path).unwrap();
        assert!(files.iter().all(|f| f.restored));
        assert!(restore(&fixture.log_path, Selection::All).is_err());
    }

    #[test]
    fn test_restore_never_overwrites() {
        let fixture = trash_files(&["a.jpg"]);
        fs::write(&fixture.originals[0], b"replacement").unwrap();

        let results = restore(&fixture.log_path, Selection::Record(0)).unwrap();
        assert!(matches!(&results[..], [RestoreResult::Failed { .. }]));
        assert_eq!(fs::read(&fixture.originals[0]).unwrap(), b"replacement");

        let entries = read_entries(&fixture.log_path).unwrap();
        assert!(matches!(
            entries.last().map(|e| &e.event),
            Some(LogEvent::RestoreFailed { .. })
        ));
        assert!(!list(&fixture.log_path).unwrap()[0].restored);
    }

    #[test]
    fn test_restore_detects_modified_trash_copy() {
        let fixture = trash_files(&["a.jpg"]);
        let destination = list(&fixture.log_path).unwrap()[0].destination.clone();
        fs::write(&destination, b"tampered").unwrap();

        let results = restore(&fixture.log_path, Selection::Latest).unwrap();
        assert!(matches!(&results[..], [RestoreResult::Failed { .. }]));
        assert!(!fixture.originals[0].exists());
    }

    #[test]
    fn test_invalid_record_index() {
        let fixture = trash_files(&["a.jpg"]);
        assert!(restore(&fixture.log_path, Selection::Record(3)).is_err());
    }
}
