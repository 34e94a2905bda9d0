//! Pluggable blob storage for image attachment bytes.
//!
//! Attachment bytes live outside the database. The attachment repository
//! records a storage path; this module writes, reads, and removes the bytes
//! behind that path.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use cairn_core::Result;

/// Storage backend trait for different storage implementations.
///
/// Allows abstracting over filesystem, S3, or other storage providers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. A missing file is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend.
///
/// Stores files in a directory hierarchy derived from the attachment ID.
/// Path format: `{base_path}/blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the backend can create, write, read, and delete files.
    ///
    /// Performs a full round-trip at startup to catch filesystem issues
    /// (permission errors, read-only mounts, overlayfs quirks) before the
    /// first upload does.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("blobs/.health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await; // Best-effort cleanup

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, full_path = %full_path.display(), size = data.len(), "storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "storage: File::create failed");
            e
        })?;
        file.write_all(data).await.map_err(|e| {
            warn!(error = %e, "storage: write_all failed");
            e
        })?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "storage: rename failed");
            e
        })?;

        // Set permissions to 0644 (rw-r--r--, no execute)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        Ok(fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if tokio::fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        Ok(tokio::fs::try_exists(full_path).await?)
    }
}

/// Generate a storage path from an attachment ID.
///
/// Path format: `blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`
///
/// Example: `blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin`
pub fn generate_storage_path(uuid: &Uuid) -> String {
    let hex = uuid.as_hyphenated().to_string().replace('-', "");
    format!(
        "blobs/{}/{}/{}.bin",
        &hex[0..2],
        &hex[2..4],
        uuid.as_hyphenated()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_path_shape() {
        let id = Uuid::now_v7();
        let path = generate_storage_path(&id);
        let hex = id.as_hyphenated().to_string().replace('-', "");

        assert!(path.starts_with(&format!("blobs/{}/{}/", &hex[0..2], &hex[2..4])));
        assert!(path.ends_with(&format!("{}.bin", id.as_hyphenated())));
    }

    #[test]
    fn test_generate_storage_path_stable() {
        let id = Uuid::now_v7();
        assert_eq!(generate_storage_path(&id), generate_storage_path(&id));
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = generate_storage_path(&Uuid::now_v7());

        backend.write(&path, b"hello blob").await.unwrap();
        let data = backend.read(&path).await.unwrap();
        assert_eq!(data, b"hello blob");
    }

    #[tokio::test]
    async fn test_write_creates_shard_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = generate_storage_path(&Uuid::now_v7());

        backend.write(&path, b"x").await.unwrap();
        assert!(dir.path().join(&path).exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = generate_storage_path(&Uuid::now_v7());

        backend.write(&path, b"first").await.unwrap();
        backend.write(&path, b"second").await.unwrap();
        assert_eq!(backend.read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = generate_storage_path(&Uuid::now_v7());

        backend.write(&path, b"x").await.unwrap();
        backend.delete(&path).await.unwrap();
        assert!(!backend.exists(&path).await.unwrap());

        // Deleting again is not an error.
        backend.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let path = generate_storage_path(&Uuid::now_v7());

        assert!(!backend.exists(&path).await.unwrap());
        backend.write(&path, b"x").await.unwrap();
        assert!(backend.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.validate().await.unwrap();
    }
}
