//! SHA-256 content hashing.
//!
//! Hashes are lowercase hex without separators. The same bytes hash to the
//! same value regardless of the file's name.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::StorageError;

const READ_CHUNK: usize = 64 * 1024;

/// Hash an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash a file, streaming it in fixed-size chunks.
pub async fn hash_file(path: &Path) -> Result<String, StorageError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_vectors() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
        assert_eq!(hash_bytes(b"abc"), ABC_SHA256);
    }

    #[tokio::test]
    async fn file_hash_matches_buffer_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        // Spans several read chunks
        let data: Vec<u8> = (0..READ_CHUNK * 3 + 17).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        assert_eq!(hash_file(&path).await.unwrap(), hash_bytes(&data));
    }

    #[tokio::test]
    async fn name_does_not_affect_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, b"abc").await.unwrap();
        tokio::fs::write(&b, b"abc").await.unwrap();

        assert_eq!(hash_file(&a).await.unwrap(), ABC_SHA256);
        assert_eq!(hash_file(&b).await.unwrap(), ABC_SHA256);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = hash_file(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }
}
