//! Comment repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use socialsync_common::AppResult;

use crate::entities::{Comment, post};
use crate::store::{DocumentStoreService, Query};
use crate::subscription::Subscription;

/// Field comments are ordered by.
const CREATED_AT: &str = "createdAt";

/// Comment repository for document operations.
#[derive(Clone)]
pub struct CommentRepository {
    store: DocumentStoreService,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(store: DocumentStoreService) -> Self {
        Self { store }
    }

    /// The store clock, used to stamp new comments.
    #[must_use]
    pub fn server_time(&self) -> DateTime<Utc> {
        self.store.server_time()
    }

    /// Write a comment under its pre-allocated ID.
    pub async fn create(&self, post_id: &str, comment: &Comment) -> AppResult<()> {
        self.store
            .set(
                &post::comments_path(post_id),
                &comment.id,
                serde_json::to_value(comment)?,
            )
            .await
    }

    /// Keep a post's comments live, newest first.
    pub fn subscribe<F>(&self, post_id: &str, listener: F) -> Subscription
    where
        F: Fn(AppResult<Vec<Comment>>) + Send + Sync + 'static,
    {
        self.store.subscribe(
            &post::comments_path(post_id),
            Query::new().order_by_desc(CREATED_AT),
            Arc::new(move |result| {
                listener(result.and_then(|docs| super::decode_all(&docs)));
            }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::DocumentStore;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_comments_are_scoped_to_one_post() {
        let store = MemoryStore::new();
        let repo = CommentRepository::new(Arc::new(store.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = repo.subscribe("p1", move |result| {
            *sink.lock().unwrap() = result.unwrap();
        });

        for (post_id, id) in [("p1", "c1"), ("p2", "c2"), ("p1", "c3")] {
            let comment = Comment {
                id: id.to_string(),
                name: "Ann".to_string(),
                image: None,
                text: format!("comment {id}"),
                created_at: store.server_time(),
            };
            repo.create(post_id, &comment).await.unwrap();
        }

        let ids: Vec<_> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, ["c3", "c1"]);
    }
}
