//! Blob capability.
//!
//! Uploads stream in chunks and report progress after each one; the upload
//! resolves to a public URL for the stored object.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use socialsync_common::{AppError, AppResult, StorageBackendKind, StorageConfig};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::lock;

/// Bytes transferred so far out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub transferred: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Whole-number percentage, rounded to nearest.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let ratio = self.transferred.min(self.total) as f64 / self.total as f64;
        (ratio * 100.0).round() as u8
    }
}

/// Blob storage operations consumed by the client.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `path` and return its public URL.
    ///
    /// `progress` is called after every transferred chunk.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> AppResult<String>;
}

/// Shared blob store handle.
pub type BlobService = Arc<dyn BlobStore>;

/// Build the configured blob backend.
pub fn from_config(config: &StorageConfig) -> AppResult<BlobService> {
    Ok(match config.backend {
        StorageBackendKind::Memory => Arc::new(MemoryBlobStore::new(
            &config.base_url,
            config.chunk_size,
        )?),
        StorageBackendKind::Local => Arc::new(LocalBlobStore::new(
            config.base_path.clone(),
            &config.base_url,
            config.chunk_size,
        )?),
    })
}

fn parse_base_url(base_url: &str) -> AppResult<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    Url::parse(&normalized)
        .map_err(|e| AppError::Config(format!("Invalid storage base URL {base_url}: {e}")))
}

/// Public URL of `path` under `base`, with each path segment percent-encoded.
fn public_url(base: &Url, path: &str) -> AppResult<String> {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    base.join(&encoded.join("/"))
        .map(String::from)
        .map_err(|e| AppError::Upload(format!("Cannot build URL for {path}: {e}")))
}

fn validate_path(path: &str) -> AppResult<()> {
    if path.is_empty() || path.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(AppError::Validation(format!("Invalid object path: {path}")));
    }
    Ok(())
}

struct StoredObject {
    content_type: String,
    data: Bytes,
}

/// In-process blob store.
///
/// [`fail_after_chunks`](MemoryBlobStore::fail_after_chunks) interrupts the
/// next upload mid-stream.
#[derive(Clone)]
pub struct MemoryBlobStore {
    base_url: Url,
    chunk_size: usize,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MemoryBlobStore {
    /// Create an empty store serving objects under `base_url`.
    pub fn new(base_url: &str, chunk_size: usize) -> AppResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            chunk_size: chunk_size.max(1),
            objects: Arc::default(),
            fail_after: Arc::default(),
        })
    }

    /// Make the next upload fail after `chunks` chunks went through.
    pub fn fail_after_chunks(&self, chunks: usize) {
        *lock(&self.fail_after) = Some(chunks);
    }

    /// Stored bytes for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Bytes> {
        lock(&self.objects).get(path).map(|o| o.data.clone())
    }

    /// Stored content type for `path`.
    #[must_use]
    pub fn content_type(&self, path: &str) -> Option<String> {
        lock(&self.objects).get(path).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> AppResult<String> {
        validate_path(path)?;
        let fail_after = lock(&self.fail_after).take();
        let total = data.len() as u64;
        let mut transferred = 0u64;

        for (index, chunk) in data.chunks(self.chunk_size).enumerate() {
            if fail_after == Some(index) {
                tracing::warn!(path, transferred, total, "Upload interrupted");
                return Err(AppError::Upload(format!(
                    "Connection lost after {transferred} of {total} bytes"
                )));
            }
            transferred += chunk.len() as u64;
            progress(UploadProgress { transferred, total });
            tokio::task::yield_now().await;
        }

        lock(&self.objects).insert(
            path.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data,
            },
        );
        tracing::debug!(path, size = total, "Stored object");
        public_url(&self.base_url, path)
    }
}

/// Blob store writing objects to the local filesystem.
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: Url,
    chunk_size: usize,
}

impl LocalBlobStore {
    /// Create a store writing under `base_path`.
    pub fn new(base_path: PathBuf, base_url: &str, chunk_size: usize) -> AppResult<Self> {
        Ok(Self {
            base_path,
            base_url: parse_base_url(base_url)?,
            chunk_size: chunk_size.max(1),
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> AppResult<String> {
        validate_path(path)?;
        let target = self.base_path.join(path);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&target).await?;
        let total = data.len() as u64;
        let mut transferred = 0u64;
        for chunk in data.chunks(self.chunk_size) {
            file.write_all(chunk).await?;
            transferred += chunk.len() as u64;
            progress(UploadProgress { transferred, total });
        }
        file.flush().await?;

        tracing::debug!(path, size = total, content_type, "Wrote object");
        public_url(&self.base_url, path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recorder() -> (
        Arc<Mutex<Vec<u8>>>,
        impl Fn(UploadProgress) + Send + Sync,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p: UploadProgress| {
            sink.lock().unwrap().push(p.percent());
        })
    }

    #[test]
    fn test_percent_rounds() {
        let p = UploadProgress {
            transferred: 1,
            total: 3,
        };
        assert_eq!(p.percent(), 33);
        let p = UploadProgress {
            transferred: 2,
            total: 3,
        };
        assert_eq!(p.percent(), 67);
    }

    #[tokio::test]
    async fn test_memory_upload_reports_each_chunk() {
        let store = MemoryBlobStore::new("http://localhost:3000/files", 4).unwrap();
        let (seen, progress) = recorder();

        let url = store
            .upload("images/cat pic.png", Bytes::from_static(b"0123456789"), "image/png", &progress)
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:3000/files/images/cat%20pic.png");
        assert_eq!(*seen.lock().unwrap(), vec![40, 80, 100]);
        assert_eq!(store.get("images/cat pic.png").unwrap().len(), 10);
        assert_eq!(store.content_type("images/cat pic.png").unwrap(), "image/png");
    }

    #[tokio::test]
    async fn test_memory_upload_interrupted() {
        let store = MemoryBlobStore::new("http://localhost/", 4).unwrap();
        store.fail_after_chunks(1);
        let (seen, progress) = recorder();

        let result = store
            .upload("images/a.png", Bytes::from_static(b"0123456789"), "image/png", &progress)
            .await;

        assert!(matches!(result, Err(AppError::Upload(_))));
        assert_eq!(*seen.lock().unwrap(), vec![40]);
        assert!(store.get("images/a.png").is_none());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let store = MemoryBlobStore::new("http://localhost/", 4).unwrap();
        let result = store
            .upload("images/../secret", Bytes::from_static(b"x"), "", &|_| {})
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_bad_base_url_is_config_error() {
        assert!(matches!(
            MemoryBlobStore::new("not a url", 4),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_local_upload_writes_file() {
        let dir = std::env::temp_dir().join(format!("socialsync-blob-{}", std::process::id()));
        let store = LocalBlobStore::new(dir.clone(), "http://localhost/files/", 3).unwrap();
        let (seen, progress) = recorder();

        let url = store
            .upload("profileImages/me.jpg", Bytes::from_static(b"abcdef"), "image/jpeg", &progress)
            .await
            .unwrap();

        assert_eq!(url, "http://localhost/files/profileImages/me.jpg");
        assert_eq!(
            tokio::fs::read(dir.join("profileImages/me.jpg")).await.unwrap(),
            b"abcdef"
        );
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
