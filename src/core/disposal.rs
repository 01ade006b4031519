use crate::core::hash::content_digest;
use crate::core::image::ImageRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisposalError {
    #[error("Failed to create trash folder {path}: {source}")]
    CreateTrash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from} → {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalMode {
    Permanent,
    Trash(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DisposalAction {
    Trashed {
        destination: PathBuf,
        digest: Option<String>,
    },
    Deleted,
    /// The file was already gone; nothing to do.
    AlreadyGone,
    Failed {
        error: String,
    },
}

/// Outcome of one disposal. Written once to the run log, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub action: DisposalAction,
}

impl DisposalRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.action, DisposalAction::Failed { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(
            self.action,
            DisposalAction::Trashed { .. } | DisposalAction::Deleted
        )
    }
}

/// The only component that mutates the file system during a run.
pub struct Disposer {
    mode: DisposalMode,
}

impl Disposer {
    pub fn new(mode: DisposalMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &DisposalMode {
        &self.mode
    }

    /// Dispose of `record`'s file. Failures are captured in the returned record.
    pub fn dispose(&self, record: &ImageRecord) -> DisposalRecord {
        let action = match self.try_dispose(&record.path) {
            Ok(action) => action,
            Err(e) => {
                log::warn!("{}", e);
                DisposalAction::Failed {
                    error: e.to_string(),
                }
            }
        };

        DisposalRecord {
            path: record.path.clone(),
            action,
        }
    }

    pub fn try_dispose(&self, path: &Path) -> Result<DisposalAction, DisposalError> {
        if !exists(path) {
            log::info!("{} is already gone", path.display());
            return Ok(DisposalAction::AlreadyGone);
        }

        match &self.mode {
            DisposalMode::Permanent => match fs::remove_file(path) {
                Ok(()) => Ok(DisposalAction::Deleted),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DisposalAction::AlreadyGone),
                Err(source) => Err(DisposalError::Delete {
                    path: path.to_path_buf(),
                    source,
                }),
            },
            DisposalMode::Trash(trash_dir) => {
                fs::create_dir_all(trash_dir).map_err(|source| DisposalError::CreateTrash {
                    path: trash_dir.clone(),
                    source,
                })?;

                let digest = content_digest(path).map_err(|source| DisposalError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

                let destination = unique_destination(trash_dir, path);
                move_file(path, &destination).map_err(|source| DisposalError::Move {
                    from: path.to_path_buf(),
                    to: destination.clone(),
                    source,
                })?;

                Ok(DisposalAction::Trashed {
                    destination,
                    digest: Some(digest),
                })
            }
        }
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// First free name for `source` inside `dir`: `name.ext`, `name-1.ext`, `name-2.ext`, ...
pub fn unique_destination(dir: &Path, source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let candidate = dir.join(&file_name);
    if !exists(&candidate) {
        return candidate;
    }

    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|counter| dir.join(format!("{}-{}{}", stem, counter, extension)))
        .find(|candidate| !exists(candidate))
        .unwrap_or(candidate)
}

/// Move `from` to `to`. Across devices the file is copied and synced before the
/// source is removed; on any failure exactly one copy (the original) remains.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(e) => Err(e),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let copied = fs::copy(from, to).and_then(|_| File::open(to)?.sync_all());
    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Fingerprint;
    use tempfile::TempDir;

    fn image_file(dir: &Path, name: &str, content: &[u8]) -> ImageRecord {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        ImageRecord::new(path, Fingerprint::new(0), content.len() as u64)
    }

    #[test]
    fn test_permanent_delete() {
        let temp_dir = TempDir::new().unwrap();
        let record = image_file(temp_dir.path(), "dup.jpg", b"bytes");

        let result = Disposer::new(DisposalMode::Permanent).dispose(&record);
        assert_eq!(result.action, DisposalAction::Deleted);
        assert_eq!(result.path, record.path);
        assert!(!record.path.exists());
    }

    #[test]
    fn test_trash_creates_folder_and_moves() {
        let temp_dir = TempDir::new().unwrap();
        let trash = temp_dir.path().join("nested").join("trash");
        let record = image_file(temp_dir.path(), "dup.jpg", b"bytes");

        let result = Disposer::new(DisposalMode::Trash(trash.clone())).dispose(&record);
        let (destination, digest) = match result.action {
            DisposalAction::Trashed { destination, digest } => (destination, digest),
            other => panic!("expected trashed, got {:?}", other),
        };
        assert_eq!(destination, trash.join("dup.jpg"));
        assert_eq!(fs::read(&destination).unwrap(), b"bytes");
        assert_eq!(digest, Some(blake3::hash(b"bytes").to_hex().to_string()));
        assert!(!record.path.exists());
    }

    #[test]
    fn test_trash_name_collision_is_disambiguated() {
        let temp_dir = TempDir::new().unwrap();
        let trash = temp_dir.path().join("trash");
        let first = image_file(temp_dir.path(), "a/photo.jpg", b"first");
        let second = image_file(temp_dir.path(), "b/photo.jpg", b"second");
        let third = image_file(temp_dir.path(), "c/photo.jpg", b"third");

        let disposer = Disposer::new(DisposalMode::Trash(trash.clone()));
        for record in [&first, &second, &third] {
            assert!(!disposer.dispose(record).is_failure());
        }

        assert_eq!(fs::read(trash.join("photo.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(trash.join("photo-1.jpg")).unwrap(), b"second");
        assert_eq!(fs::read(trash.join("photo-2.jpg")).unwrap(), b"third");
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("raw"), b"x").unwrap();

        assert_eq!(
            unique_destination(temp_dir.path(), Path::new("/elsewhere/raw")),
            temp_dir.path().join("raw-1")
        );
    }

    #[test]
    fn test_disposal_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let record = image_file(temp_dir.path(), "dup.jpg", b"bytes");

        for mode in [
            DisposalMode::Permanent,
            DisposalMode::Trash(temp_dir.path().join("trash")),
        ] {
            let disposer = Disposer::new(mode);
            disposer.dispose(&record);
            let again = disposer.dispose(&record);
            assert_eq!(again.action, DisposalAction::AlreadyGone);
            assert!(!again.is_failure());
        }
    }

    #[test]
    fn test_failure_leaves_original_intact() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("trash");
        fs::write(&not_a_dir, b"occupied").unwrap();
        let record = image_file(temp_dir.path(), "dup.jpg", b"bytes");

        let result = Disposer::new(DisposalMode::Trash(not_a_dir)).dispose(&record);
        assert!(result.is_failure());
        assert!(!result.is_removal());
        assert_eq!(fs::read(&record.path).unwrap(), b"bytes");
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = DisposalRecord {
            path: PathBuf::from("/img/a.jpg"),
            action: DisposalAction::Failed {
                error: "Permission denied".to_string(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["path"], "/img/a.jpg");
        assert_eq!(json["action"], "failed");
        assert_eq!(json["error"], "Permission denied");

        let back: DisposalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
