//! Post composer.

use bytes::Bytes;
use socialsync_common::{AppResult, TaggingConfig};
use socialsync_db::entities::Post;

use super::feed::{AuthorSnapshot, FeedSynchronizer, PostDraft};
use super::media::{MediaKind, MediaUploader};
use super::tagging::{StagedImage, TaggingOverlay};
use super::view_reducer::{ViewAction, ViewStore};

/// Draft state behind the home screen's "create post" box.
pub struct PostComposer {
    feed: FeedSynchronizer,
    uploader: MediaUploader,
    text: String,
    image: Option<String>,
    overlay: TaggingOverlay,
    view: ViewStore,
}

impl PostComposer {
    /// Create an empty composer.
    #[must_use]
    pub fn new(feed: FeedSynchronizer, uploader: MediaUploader, tagging: TaggingConfig) -> Self {
        Self {
            feed,
            uploader,
            text: String::new(),
            image: None,
            overlay: TaggingOverlay::new(tagging),
            view: ViewStore::new(),
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// URL of the attached image.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Upload an image, attach it and stage it for tagging.
    pub async fn attach_image(
        &mut self,
        file_name: &str,
        data: Bytes,
        width: i32,
        height: i32,
    ) -> AppResult<String> {
        let url = match self
            .uploader
            .upload(MediaKind::PostImage, file_name, data)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                if !e.is_local() {
                    self.view.dispatch(ViewAction::HandleError);
                }
                return Err(e);
            }
        };

        self.image = Some(url.clone());
        self.overlay.stage_image(StagedImage {
            url: url.clone(),
            width,
            height,
        });
        Ok(url)
    }

    /// Upload progress of the attached image.
    #[must_use]
    pub fn upload_progress(&self) -> u8 {
        self.uploader.progress()
    }

    #[must_use]
    pub const fn overlay(&self) -> &TaggingOverlay {
        &self.overlay
    }

    pub const fn overlay_mut(&mut self) -> &mut TaggingOverlay {
        &mut self.overlay
    }

    /// Whether a submit or upload has failed since the composer was created.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.view.has_error()
    }

    /// Write the draft as a post and reset the composer.
    ///
    /// On failure the draft is kept so it can be retried.
    pub async fn submit(&mut self, author: &AuthorSnapshot) -> AppResult<Post> {
        let draft = PostDraft {
            text: self.text.clone(),
            image: self.image.clone(),
            tags: self.overlay.tag_names(),
        };

        match self.feed.submit_post(author, draft).await {
            Ok(post) => {
                self.cancel();
                Ok(post)
            }
            Err(e) => {
                if !e.is_local() {
                    self.view.dispatch(ViewAction::HandleError);
                }
                Err(e)
            }
        }
    }

    /// Discard the draft.
    pub fn cancel(&mut self) {
        self.text.clear();
        self.image = None;
        self.overlay.clear();
    }
}
