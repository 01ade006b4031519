use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Compute the blake3 digest of a file's contents as lowercase hex.
/// Recorded for trashed files so a restore can check it returns the same bytes.
pub fn content_digest(file_path: &Path) -> std::io::Result<String> {
    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_digest_is_stable_hex() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.bin");
        fs::write(&file_path, b"Hello, World!").unwrap();

        let digest = content_digest(&file_path).unwrap();
        assert_eq!(digest, content_digest(&file_path).unwrap());
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, blake3::hash(b"Hello, World!").to_hex().to_string());
    }

    #[test]
    fn test_identical_files_same_digest() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("file1");
        let file2 = temp_dir.path().join("file2");
        let file3 = temp_dir.path().join("file3");
        fs::write(&file1, b"Identical content").unwrap();
        fs::write(&file2, b"Identical content").unwrap();
        fs::write(&file3, b"Other content").unwrap();

        assert_eq!(content_digest(&file1).unwrap(), content_digest(&file2).unwrap());
        assert_ne!(content_digest(&file1).unwrap(), content_digest(&file3).unwrap());
    }
}
