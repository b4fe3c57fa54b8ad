//! Likes and post tags.
//!
//! [`PostInteractionManager`] mounts the per-post components: the like
//! button ([`PostInteractions`]) and the comment list
//! ([`CommentThread`](super::comment::CommentThread)).

use socialsync_common::{AppResult, IdGenerator};
use socialsync_db::Subscription;
use socialsync_db::entities::Like;
use socialsync_db::repositories::{CommentRepository, LikeRepository, PostRepository};

use super::comment::CommentThread;
use super::feed::AuthorSnapshot;
use super::toast::{ToasterService, report, reported};
use super::view_reducer::{ViewAction, ViewStore};

/// Mounts per-post interaction components.
#[derive(Clone)]
pub struct PostInteractionManager {
    likes: LikeRepository,
    posts: PostRepository,
    comments: CommentRepository,
    toaster: ToasterService,
    id_gen: IdGenerator,
}

impl PostInteractionManager {
    /// Create an interaction manager.
    #[must_use]
    pub fn new(
        likes: LikeRepository,
        posts: PostRepository,
        comments: CommentRepository,
        toaster: ToasterService,
    ) -> Self {
        Self {
            likes,
            posts,
            comments,
            toaster,
            id_gen: IdGenerator::new(),
        }
    }

    /// Start tracking likes on `post_id` for `viewer_id`.
    ///
    /// Tags are read once at mount; likes stay live until unmount.
    pub async fn mount(&self, post_id: &str, viewer_id: &str) -> PostInteractions {
        let view = ViewStore::new();

        let tags = match self.posts.find_by_id(post_id).await {
            Ok(post) => post.map(|p| p.tags).unwrap_or_default(),
            Err(e) => {
                view.dispatch(ViewAction::HandleError);
                report(&*self.toaster, "load_tags", &e);
                Vec::new()
            }
        };

        let subscription = {
            let view = view.clone();
            let toaster = self.toaster.clone();
            self.likes.subscribe(post_id, move |result| match result {
                Ok(likes) => view.dispatch(ViewAction::AddLikes(likes)),
                Err(e) => {
                    view.dispatch(ViewAction::HandleError);
                    report(&*toaster, "watch_likes", &e);
                }
            })
        };

        PostInteractions {
            post_id: post_id.to_string(),
            viewer_id: viewer_id.to_string(),
            likes: self.likes.clone(),
            toaster: self.toaster.clone(),
            view,
            tags,
            subscription,
        }
    }

    /// Start tracking the comments on `post_id`, writing new ones as `author`.
    #[must_use]
    pub fn mount_comments(&self, post_id: &str, author: AuthorSnapshot) -> CommentThread {
        CommentThread::mount(
            self.comments.clone(),
            self.toaster.clone(),
            self.id_gen.clone(),
            post_id,
            author,
        )
    }
}

/// Like state of one post as seen by one viewer.
pub struct PostInteractions {
    post_id: String,
    viewer_id: String,
    likes: LikeRepository,
    toaster: ToasterService,
    view: ViewStore,
    tags: Vec<String>,
    subscription: Subscription,
}

impl PostInteractions {
    #[must_use]
    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Current likes.
    #[must_use]
    pub fn likes(&self) -> Vec<Like> {
        self.view.snapshot().likes
    }

    #[must_use]
    pub fn like_count(&self) -> usize {
        self.view.snapshot().likes.len()
    }

    /// Whether the viewer's like is in the live like set.
    #[must_use]
    pub fn is_liked(&self) -> bool {
        self.view
            .snapshot()
            .likes
            .iter()
            .any(|l| l.id == self.viewer_id)
    }

    /// Names tagged in the post's image.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.view.has_error()
    }

    /// Like the post, or remove the viewer's like if there is one.
    ///
    /// Checks the stored like rather than the live set, then writes; two
    /// overlapping toggles can both see the same state.
    pub async fn toggle_like(&self) -> AppResult<bool> {
        let result = self.toggle_like_inner().await;
        if result.is_err() {
            self.view.dispatch(ViewAction::HandleError);
        }
        reported(&*self.toaster, "toggle_like", result)
    }

    async fn toggle_like_inner(&self) -> AppResult<bool> {
        if self
            .likes
            .find(&self.post_id, &self.viewer_id)
            .await?
            .is_some()
        {
            self.likes.delete(&self.post_id, &self.viewer_id).await?;
            tracing::debug!(post_id = %self.post_id, user_id = %self.viewer_id, "Unliked post");
            Ok(false)
        } else {
            let like = Like {
                id: self.viewer_id.clone(),
            };
            self.likes.create(&self.post_id, &like).await?;
            tracing::debug!(post_id = %self.post_id, user_id = %self.viewer_id, "Liked post");
            Ok(true)
        }
    }

    /// Stop listening.
    pub fn unmount(self) {
        self.subscription.dispose();
    }
}
