//! Content checksums for adapter artifacts.
//!
//! An artifact is either a single file or a directory (adapter weights plus
//! config). Directory checksums cover every regular file, visited in sorted
//! order, hashing the relative path and then the content.

use crate::error::{TrainingError, TrainingResult};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

const CHUNK: usize = 64 * 1024;

fn hash_reader<R: Read>(reader: &mut R, hasher: &mut Sha256) -> TrainingResult<()> {
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    hash_reader(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_dir(root: &Path) -> TrainingResult<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| TrainingError::Artifact(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| TrainingError::Artifact(e.to_string()))?;
        hasher.update(rel.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update(b"\0");
        let mut file = std::fs::File::open(entry.path())?;
        hash_reader(&mut file, &mut hasher)?;
        hasher.update(b"\n");
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Checksum of a file or directory artifact.
pub fn artifact_checksum(path: &Path) -> TrainingResult<String> {
    let md = std::fs::metadata(path).map_err(|e| {
        TrainingError::Artifact(format!("artifact path {} unreadable: {}", path.display(), e))
    })?;
    if md.is_dir() { sha256_dir(path) } else { sha256_file(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_checksum_changes_with_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("adapter.bin");
        std::fs::write(&path, b"weights-v1").unwrap();
        let a = artifact_checksum(&path).unwrap();
        assert_eq!(a, artifact_checksum(&path).unwrap());

        std::fs::write(&path, b"weights-v2").unwrap();
        assert_ne!(a, artifact_checksum(&path).unwrap());
    }

    #[test]
    fn test_dir_checksum_covers_nested_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("adapter");
        std::fs::create_dir_all(root.join("shards")).unwrap();
        std::fs::write(root.join("adapter_config.json"), b"{}").unwrap();
        std::fs::write(root.join("shards").join("0.bin"), b"abc").unwrap();
        let before = artifact_checksum(&root).unwrap();

        std::fs::write(root.join("shards").join("0.bin"), b"abd").unwrap();
        assert_ne!(before, artifact_checksum(&root).unwrap());
    }

    #[test]
    fn test_missing_artifact_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(artifact_checksum(&temp.path().join("missing")).is_err());
    }
}
