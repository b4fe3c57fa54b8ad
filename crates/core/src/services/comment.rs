//! Comment threads.

use socialsync_common::{AppError, AppResult, IdGenerator};
use socialsync_db::Subscription;
use socialsync_db::entities::Comment;
use socialsync_db::repositories::CommentRepository;

use super::feed::AuthorSnapshot;
use super::toast::{ToasterService, report, reported};
use super::view_reducer::{ViewAction, ViewStore};

/// Live comments of one post, newest first.
///
/// Comments cannot be edited or deleted once written.
pub struct CommentThread {
    post_id: String,
    author: AuthorSnapshot,
    comments: CommentRepository,
    toaster: ToasterService,
    id_gen: IdGenerator,
    view: ViewStore,
    subscription: Subscription,
}

impl CommentThread {
    pub(crate) fn mount(
        comments: CommentRepository,
        toaster: ToasterService,
        id_gen: IdGenerator,
        post_id: &str,
        author: AuthorSnapshot,
    ) -> Self {
        let view = ViewStore::new();
        let subscription = {
            let view = view.clone();
            let toaster = toaster.clone();
            comments.subscribe(post_id, move |result| match result {
                Ok(comments) => view.dispatch(ViewAction::AddComments(comments)),
                Err(e) => {
                    view.dispatch(ViewAction::HandleError);
                    report(&*toaster, "watch_comments", &e);
                }
            })
        };

        Self {
            post_id: post_id.to_string(),
            author,
            comments,
            toaster,
            id_gen,
            view,
            subscription,
        }
    }

    /// Current comments, newest first.
    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.view.snapshot().comments
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.view.has_error()
    }

    /// Write a comment as the mounting user.
    pub async fn submit(&self, text: &str) -> AppResult<Comment> {
        let result = self.submit_inner(text).await;
        if matches!(&result, Err(e) if !e.is_local()) {
            self.view.dispatch(ViewAction::HandleError);
        }
        reported(&*self.toaster, "submit_comment", result)
    }

    async fn submit_inner(&self, text: &str) -> AppResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }

        let comment = Comment {
            id: self.id_gen.generate(),
            name: self.author.name.clone(),
            image: self.author.avatar.clone(),
            text: text.to_string(),
            created_at: self.comments.server_time(),
        };
        self.comments.create(&self.post_id, &comment).await?;
        tracing::debug!(post_id = %self.post_id, comment_id = %comment.id, "Added comment");
        Ok(comment)
    }

    /// Stop listening.
    pub fn unmount(self) {
        self.subscription.dispose();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::toast::RecordingToaster;
    use socialsync_db::MemoryStore;
    use std::sync::Arc;

    fn thread(store: &MemoryStore, toaster: &RecordingToaster, post_id: &str) -> CommentThread {
        CommentThread::mount(
            CommentRepository::new(Arc::new(store.clone())),
            Arc::new(toaster.clone()),
            IdGenerator::new(),
            post_id,
            AuthorSnapshot {
                uid: "u2".to_string(),
                name: "Bob".to_string(),
                avatar: None,
                email: None,
            },
        )
    }

    #[tokio::test]
    async fn test_newest_first() {
        let store = MemoryStore::new();
        let toaster = RecordingToaster::new();
        let thread = thread(&store, &toaster, "p1");

        let first = thread.submit("first!").await.unwrap();
        let second = thread.submit("second").await.unwrap();

        let ids: Vec<_> = thread.comments().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, [second.id, first.id]);
        assert_eq!(thread.comments()[0].name, "Bob");
        thread.unmount();
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_blank_comment_rejected_without_error_latch() {
        let store = MemoryStore::new();
        let toaster = RecordingToaster::new();
        let thread = thread(&store, &toaster, "p1");

        let result = thread.submit("   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(thread.comments().is_empty());
        assert!(!thread.has_error());
        assert_eq!(toaster.errors(), vec!["Comment cannot be empty"]);
        thread.unmount();
    }

    #[tokio::test]
    async fn test_read_failure_latches() {
        let store = MemoryStore::new();
        let toaster = RecordingToaster::new();
        store.fail_reads(Some("offline"));
        let thread = thread(&store, &toaster, "p1");
        assert!(thread.has_error());
        thread.unmount();
    }
}
