//! Like repository.

use std::sync::Arc;

use socialsync_common::AppResult;

use crate::entities::{Like, post};
use crate::store::{DocumentStoreService, Query};
use crate::subscription::Subscription;

/// Like repository for document operations.
#[derive(Clone)]
pub struct LikeRepository {
    store: DocumentStoreService,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(store: DocumentStoreService) -> Self {
        Self { store }
    }

    /// Find the like `user_id` left on a post.
    pub async fn find(&self, post_id: &str, user_id: &str) -> AppResult<Option<Like>> {
        self.store
            .get(&post::likes_path(post_id), user_id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Record a like, keyed by the liking user.
    pub async fn create(&self, post_id: &str, like: &Like) -> AppResult<()> {
        self.store
            .set(&post::likes_path(post_id), &like.id, serde_json::to_value(like)?)
            .await
    }

    /// Remove the like `user_id` left on a post.
    pub async fn delete(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        self.store.delete(&post::likes_path(post_id), user_id).await
    }

    /// Keep a post's like set live.
    pub fn subscribe<F>(&self, post_id: &str, listener: F) -> Subscription
    where
        F: Fn(AppResult<Vec<Like>>) + Send + Sync + 'static,
    {
        self.store.subscribe(
            &post::likes_path(post_id),
            Query::new(),
            Arc::new(move |result| {
                listener(result.and_then(|docs| super::decode_all(&docs)));
            }),
        )
    }
}
