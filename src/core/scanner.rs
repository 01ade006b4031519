use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp", "nef",
];

/// A file found by the scanner, before it has been fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

pub struct Scanner {
    extensions: HashSet<String>,
    excluded: Vec<PathBuf>,
}

impl Scanner {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            excluded: Vec::new(),
        }
    }

    /// Skip `path` (and everything below it if it is a directory).
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.excluded
            .push(path.canonicalize().unwrap_or(path));
        self
    }

    pub fn is_supported_format(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.excluded.iter().any(|excluded| path.starts_with(excluded))
    }

    /// Recursively walk `root` in file-name order, returning supported image files.
    pub fn scan(&self, root: &Path) -> Vec<DiscoveredFile> {
        let mut files = Vec::new();
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.depth() > 0 && self.is_excluded(entry.path()) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() || !self.is_supported_format(entry.path()) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => files.push(DiscoveredFile {
                    path: entry.path().to_path_buf(),
                    size_bytes: metadata.len(),
                }),
                Err(e) => log::warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        files
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(&DEFAULT_EXTENSIONS)
    }
}
