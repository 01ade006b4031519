use crate::core::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One discovered, successfully fingerprinted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub size_bytes: u64,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>, fingerprint: Fingerprint, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            fingerprint,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn distance(&self, other: &ImageRecord) -> u32 {
        self.fingerprint.distance(&other.fingerprint)
    }
}

/// Best-effort pixel dimensions for display; `None` when the header can't be read.
pub fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    match image::image_dimensions(path) {
        Ok(dimensions) => Some(dimensions),
        Err(e) => {
            log::debug!("Could not read dimensions for {}: {}", path.display(), e);
            None
        }
    }
}

/// Human readable byte count ("12.3 KB").
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_and_distance() {
        let a = ImageRecord::new("/photos/a.jpg", Fingerprint::new(0b1011), 10);
        let b = ImageRecord::new("/photos/b.jpg", Fingerprint::new(0b0001), 20);

        assert_eq!(a.filename(), "a.jpg");
        assert_eq!(a.distance(&b), 2);
        assert_eq!(b.distance(&a), 2);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}
