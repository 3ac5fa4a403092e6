//! Content-addressable blob storage.
//!
//! Blobs live under `<root>/blobs/sha256/<hex>`, named by the SHA-256 of
//! their bytes. Files are written once via a temp file in the same
//! directory followed by a rename, so readers never observe partial
//! content. Single-writer discipline: concurrent reads are safe, writers
//! must be serialized by the caller.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use chartcask_core::{CaskError, Result};

use crate::digest::Digest;

/// File metadata for a stored blob.
#[derive(Debug, Clone)]
pub struct BlobStat {
    /// Payload size in bytes
    pub size: u64,
    /// File modification time; only used for human-readable listings
    pub modified: DateTime<Utc>,
}

/// Content-addressable byte storage on disk.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Create a store rooted at a cache directory. The blob directory is
    /// created lazily on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join("blobs").join("sha256"),
        }
    }

    /// Path of the blob file for a digest.
    pub fn path(&self, digest: &Digest) -> PathBuf {
        self.dir.join(digest.hex())
    }

    /// Store a payload by its digest.
    ///
    /// Returns the digest and whether a blob with that digest already
    /// existed (in which case nothing is written).
    pub fn put(&self, bytes: &[u8]) -> Result<(Digest, bool)> {
        let digest = Digest::from_bytes(bytes);
        let path = self.path(&digest);

        if path.exists() {
            return Ok((digest, true));
        }

        std::fs::create_dir_all(&self.dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CaskError::Io(e.error))?;

        tracing::debug!(digest = %digest, size = bytes.len(), "stored blob");
        Ok((digest, false))
    }

    /// Read a blob's full payload.
    pub fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        match std::fs::read(self.path(digest)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CaskError::BlobNotFound {
                digest: digest.hex().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// File metadata without reading the payload.
    pub fn stat(&self, digest: &Digest) -> Result<BlobStat> {
        let meta = match std::fs::metadata(self.path(digest)) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaskError::BlobNotFound {
                    digest: digest.hex().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(BlobStat {
            size: meta.len(),
            modified: meta.modified()?.into(),
        })
    }

    /// Whether a blob with this digest is present.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.path(digest).exists()
    }

    /// Unlink a blob file.
    pub fn delete(&self, digest: &Digest) -> Result<()> {
        match std::fs::remove_file(self.path(digest)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CaskError::BlobNotFound {
                digest: digest.hex().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let (digest, existed) = store.put(b"hello").unwrap();
        assert!(!existed);
        assert_eq!(store.get(&digest).unwrap(), b"hello");
    }

    #[test]
    fn test_put_is_content_addressed() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let (digest, _) = store.put(b"hello").unwrap();
        let on_disk = tmp
            .path()
            .join("blobs")
            .join("sha256")
            .join(digest.hex());
        assert!(on_disk.exists());
        assert_eq!(Digest::from_bytes(&std::fs::read(on_disk).unwrap()), digest);
    }

    #[test]
    fn test_put_twice_reports_existed() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let (first, existed) = store.put(b"hello").unwrap();
        assert!(!existed);
        let (second, existed) = store.put(b"hello").unwrap();
        assert!(existed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_missing() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());
        let digest = Digest::from_bytes(b"never stored");
        assert!(matches!(
            store.get(&digest),
            Err(CaskError::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_stat() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let (digest, _) = store.put(b"hello").unwrap();
        let stat = store.stat(&digest).unwrap();
        assert_eq!(stat.size, 5);
        assert!(stat.modified <= Utc::now());
    }

    #[test]
    fn test_stat_missing() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());
        let digest = Digest::from_bytes(b"never stored");
        assert!(matches!(
            store.stat(&digest),
            Err(CaskError::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());

        let (digest, _) = store.put(b"hello").unwrap();
        store.delete(&digest).unwrap();
        assert!(!store.contains(&digest));
        assert!(store.delete(&digest).is_err());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = BlobStore::new(tmp.path());
        store.put(b"one").unwrap();
        store.put(b"two").unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path().join("blobs").join("sha256"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|name| name.len() == 64));
    }
}
