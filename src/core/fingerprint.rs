use image::ImageReader;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Hash of {path} has {bits} bits, expected {expected}", expected = Fingerprint::BITS)]
    HashWidth { path: PathBuf, bits: usize },
}

impl DecodeError {
    pub fn path(&self) -> &Path {
        match self {
            DecodeError::Io { path, .. }
            | DecodeError::Image { path, .. }
            | DecodeError::HashWidth { path, .. } => path,
        }
    }
}

/// 64-bit perceptual fingerprint. Visually similar images differ in few bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const BITS: u32 = u64::BITS;

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Hamming distance: number of differing bits.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(array)))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    /// Mean hash over DCT coefficients (pHash)
    #[default]
    Perceptual,
    Mean,
    Gradient,
    Blockhash,
}

impl HashKind {
    fn config(self) -> HasherConfig {
        let config = HasherConfig::new().hash_size(8, 8);
        match self {
            HashKind::Perceptual => config.hash_alg(HashAlg::Mean).preproc_dct(),
            HashKind::Mean => config.hash_alg(HashAlg::Mean),
            HashKind::Gradient => config.hash_alg(HashAlg::Gradient),
            HashKind::Blockhash => config.hash_alg(HashAlg::Blockhash),
        }
    }
}

/// Produces a fingerprint for an image file.
pub trait Fingerprinter: Sync {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, DecodeError>;
}

pub struct ImageHasher {
    hasher: Hasher,
}

impl ImageHasher {
    pub fn new(kind: HashKind) -> Self {
        Self {
            hasher: kind.config().to_hasher(),
        }
    }
}

impl Default for ImageHasher {
    fn default() -> Self {
        Self::new(HashKind::default())
    }
}

impl Fingerprinter for ImageHasher {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, DecodeError> {
        let image = ImageReader::open(path)
            .map_err(|source| DecodeError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| DecodeError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .decode()
            .map_err(|source| DecodeError::Image {
                path: path.to_path_buf(),
                source,
            })?;

        let hash = self.hasher.hash_image(&image);
        let bytes = hash.as_bytes();
        Fingerprint::from_bytes(bytes).ok_or_else(|| DecodeError::HashWidth {
            path: path.to_path_buf(),
            bits: bytes.len() * 8,
        })
    }
}
