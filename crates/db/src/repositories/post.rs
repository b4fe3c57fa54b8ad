//! Post repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use socialsync_common::AppResult;

use crate::entities::post::{self, Post};
use crate::store::{DocumentStoreService, Query};
use crate::subscription::Subscription;

/// Post repository for document operations.
#[derive(Clone)]
pub struct PostRepository {
    store: DocumentStoreService,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(store: DocumentStoreService) -> Self {
        Self { store }
    }

    /// All posts, newest first.
    #[must_use]
    pub fn global_query() -> Query {
        Query::new().order_by_desc(post::CREATED_AT)
    }

    /// Posts by any of `author_ids`, newest first.
    #[must_use]
    pub fn authors_query<'a>(author_ids: impl IntoIterator<Item = &'a str>) -> Query {
        Query::new()
            .filter_in(post::AUTHOR, author_ids)
            .order_by_desc(post::CREATED_AT)
    }

    /// Posts by one author, newest first.
    #[must_use]
    pub fn author_query(uid: &str) -> Query {
        Query::new()
            .filter_eq(post::AUTHOR, uid)
            .order_by_desc(post::CREATED_AT)
    }

    /// The store clock, used to stamp new posts.
    #[must_use]
    pub fn server_time(&self) -> DateTime<Utc> {
        self.store.server_time()
    }

    /// Write a post under its pre-allocated ID.
    pub async fn create(&self, post: &Post) -> AppResult<()> {
        self.store
            .set(post::COLLECTION, &post.id, serde_json::to_value(post)?)
            .await
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Post>> {
        self.store
            .get(post::COLLECTION, id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Delete a post.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(post::COLLECTION, id).await
    }

    /// Run a one-shot post query.
    pub async fn find(&self, query: &Query) -> AppResult<Vec<Post>> {
        let docs = self.store.query(post::COLLECTION, query).await?;
        super::decode_all(&docs)
    }

    /// Count posts by one author.
    pub async fn count_by_author(&self, uid: &str) -> AppResult<usize> {
        let docs = self
            .store
            .query(post::COLLECTION, &Query::new().filter_eq(post::AUTHOR, uid))
            .await?;
        Ok(docs.len())
    }

    /// Keep a post query live.
    pub fn subscribe<F>(&self, query: Query, listener: F) -> Subscription
    where
        F: Fn(AppResult<Vec<Post>>) + Send + Sync + 'static,
    {
        self.store.subscribe(
            post::COLLECTION,
            query,
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
    use maplit::hashset;
    use std::collections::HashSet;

    fn post(store: &MemoryStore, id: &str, uid: &str) -> Post {
        Post {
            id: id.to_string(),
            uid: uid.to_string(),
            name: uid.to_uppercase(),
            logo: None,
            email: None,
            text: format!("post {id}"),
            image: None,
            created_at: store.server_time(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_global_query_newest_first() {
        let store = MemoryStore::new();
        let repo = PostRepository::new(Arc::new(store.clone()));
        repo.create(&post(&store, "p1", "u1")).await.unwrap();
        repo.create(&post(&store, "p2", "u2")).await.unwrap();

        let posts = repo.find(&PostRepository::global_query()).await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_authors_query() {
        let store = MemoryStore::new();
        let repo = PostRepository::new(Arc::new(store.clone()));
        for (id, uid) in [("p1", "u1"), ("p2", "u2"), ("p3", "u3")] {
            repo.create(&post(&store, id, uid)).await.unwrap();
        }

        let posts = repo
            .find(&PostRepository::authors_query(["u1", "u3"]))
            .await
            .unwrap();
        let ids: HashSet<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, hashset! {"p1", "p3"});
        assert_eq!(repo.count_by_author("u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let repo = PostRepository::new(Arc::new(store.clone()));
        repo.create(&post(&store, "p1", "u1")).await.unwrap();
        repo.delete("p1").await.unwrap();
        assert!(repo.find_by_id("p1").await.unwrap().is_none());
    }
}
