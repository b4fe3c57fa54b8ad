//! Media upload pipeline.
//!
//! Uploads one selected file to blob storage under a folder chosen by what
//! the file is for, publishing progress as a whole percentage.

use std::sync::Arc;

use bytes::Bytes;
use socialsync_common::{AppError, AppResult};
use tokio::sync::watch;

use super::blob::{BlobService, UploadProgress};
use super::toast::{ToasterService, reported};

/// What an uploaded file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Image attached to a post.
    PostImage,
    /// Avatar chosen at signup or on the profile page.
    ProfileImage,
}

impl MediaKind {
    /// Storage folder for this kind.
    #[must_use]
    pub const fn folder(self) -> &'static str {
        match self {
            Self::PostImage => "images",
            Self::ProfileImage => "profileImages",
        }
    }

    /// Object path for a file of this kind.
    #[must_use]
    pub fn object_path(self, file_name: &str) -> String {
        format!("{}/{file_name}", self.folder())
    }
}

/// Guess a content type from a file extension.
fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Uploads files and tracks the progress of the latest one.
#[derive(Clone)]
pub struct MediaUploader {
    blob: BlobService,
    toaster: ToasterService,
    progress: Arc<watch::Sender<u8>>,
}

impl MediaUploader {
    /// Create an uploader.
    #[must_use]
    pub fn new(blob: BlobService, toaster: ToasterService) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            blob,
            toaster,
            progress: Arc::new(progress),
        }
    }

    /// Upload `data` as `file_name` and return its public URL.
    ///
    /// Files are stored by their original name, so uploading a second file
    /// with the same name replaces the first. Progress restarts at 0 for each
    /// upload and stays where it stopped if the upload fails.
    pub async fn upload(&self, kind: MediaKind, file_name: &str, data: Bytes) -> AppResult<String> {
        let result = self.upload_inner(kind, file_name, data).await;
        reported(&*self.toaster, "upload", result)
    }

    async fn upload_inner(&self, kind: MediaKind, file_name: &str, data: Bytes) -> AppResult<String> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.contains('/') {
            return Err(AppError::Validation("Choose a file to upload".to_string()));
        }
        if data.is_empty() {
            return Err(AppError::Validation("The selected file is empty".to_string()));
        }

        let path = kind.object_path(file_name);
        self.progress.send_replace(0);
        tracing::info!(path = %path, size = data.len(), "Uploading file");

        let progress = self.progress.clone();
        let url = self
            .blob
            .upload(&path, data, content_type_for(file_name), &move |p: UploadProgress| {
                progress.send_replace(p.percent());
            })
            .await?;

        tracing::info!(path = %path, url = %url, "Upload complete");
        Ok(url)
    }

    /// Percentage of the latest upload.
    #[must_use]
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    /// Receive every progress change.
    #[must_use]
    pub fn watch_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }
}
