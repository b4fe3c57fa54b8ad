//! Feed synchronization.
//!
//! Feeds are live: a [`FeedView`] holds the subscriptions that keep its post
//! list current until it is closed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use socialsync_common::{AppError, AppResult, IdGenerator};
use socialsync_db::Subscription;
use socialsync_db::entities::Post;
use socialsync_db::repositories::{PostRepository, ProfileRepository};
use tokio::sync::watch;

use super::lock;
use super::session::Session;
use super::toast::{ToasterService, report, reported};
use super::view_reducer::{ViewAction, ViewState, ViewStore};

/// Author display fields copied onto a post when it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSnapshot {
    pub uid: String,
    pub name: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
}

impl AuthorSnapshot {
    /// Snapshot the signed-in user.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            uid: session.identity.uid.clone(),
            name: session.display_name(),
            avatar: session.avatar(),
            email: session
                .identity
                .email
                .clone()
                .or_else(|| session.profile.as_ref().and_then(|p| p.email.clone())),
        }
    }
}

/// A post being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    /// URL of an already uploaded image.
    pub image: Option<String>,
    /// Names of users tagged in the image.
    pub tags: Vec<String>,
}

impl PostDraft {
    /// A draft with neither text nor image cannot be posted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }
}

/// Posts subscription of a personalized feed and the author set it covers.
#[derive(Default)]
struct AuthorPosts {
    authors: Option<BTreeSet<String>>,
    subscription: Option<Subscription>,
}

/// A live post list.
pub struct FeedView {
    view: ViewStore,
    subscriptions: Vec<Subscription>,
    /// Posts subscription swapped out whenever the follow set changes.
    swapped: Option<Arc<Mutex<AuthorPosts>>>,
}

impl FeedView {
    /// Current posts, newest first.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.view.snapshot().posts
    }

    /// Whether a subscription feeding this view has failed.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.view.has_error()
    }

    /// Receive every change of the underlying view state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.view.watch()
    }

    /// Stop listening.
    pub fn close(self) {
        // Outer subscriptions first, so nothing swaps in a new posts
        // subscription after it was released.
        for subscription in self.subscriptions {
            subscription.dispose();
        }
        if let Some(swapped) = self.swapped
            && let Some(subscription) = lock(&swapped).subscription.take()
        {
            subscription.dispose();
        }
    }
}

/// Listener folding post result sets into a view.
fn fold_posts(
    view: ViewStore,
    toaster: ToasterService,
    feed: &'static str,
) -> impl Fn(AppResult<Vec<Post>>) + Send + Sync + 'static {
    move |result| match result {
        Ok(posts) => view.dispatch(ViewAction::SubmitPosts(posts)),
        Err(e) => {
            view.dispatch(ViewAction::HandleError);
            report(&*toaster, feed, &e);
        }
    }
}

/// Keeps feeds live and writes posts.
#[derive(Clone)]
pub struct FeedSynchronizer {
    posts: PostRepository,
    profiles: ProfileRepository,
    toaster: ToasterService,
    default_avatar: String,
    id_gen: IdGenerator,
}

impl FeedSynchronizer {
    /// Create a feed synchronizer.
    #[must_use]
    pub fn new(
        posts: PostRepository,
        profiles: ProfileRepository,
        toaster: ToasterService,
        default_avatar: String,
    ) -> Self {
        Self {
            posts,
            profiles,
            toaster,
            default_avatar,
            id_gen: IdGenerator::new(),
        }
    }

    /// Every post, newest first.
    #[must_use]
    pub fn global(&self) -> FeedView {
        let view = ViewStore::new();
        let subscription = self.posts.subscribe(
            PostRepository::global_query(),
            fold_posts(view.clone(), self.toaster.clone(), "global_feed"),
        );
        FeedView {
            view,
            subscriptions: vec![subscription],
            swapped: None,
        }
    }

    /// Posts by one author, newest first.
    #[must_use]
    pub fn author_feed(&self, uid: &str) -> FeedView {
        let view = ViewStore::new();
        let subscription = self.posts.subscribe(
            PostRepository::author_query(uid),
            fold_posts(view.clone(), self.toaster.clone(), "author_feed"),
        );
        FeedView {
            view,
            subscriptions: vec![subscription],
            swapped: None,
        }
    }

    /// Posts by the viewer and everyone they follow, newest first.
    ///
    /// The author set follows the viewer's profile live: whenever it
    /// changes, the posts subscription is replaced by one over the new set.
    #[must_use]
    pub fn personalized(&self, viewer_id: &str) -> FeedView {
        let view = ViewStore::new();
        let swapped: Arc<Mutex<AuthorPosts>> = Arc::default();
        let generation = Arc::new(AtomicU64::new(0));

        let listener = {
            let view = view.clone();
            let swapped = swapped.clone();
            let posts = self.posts.clone();
            let toaster = self.toaster.clone();
            let viewer = viewer_id.to_string();
            move |result: AppResult<Option<socialsync_db::entities::Profile>>| {
                let profile = match result {
                    Ok(profile) => profile,
                    Err(e) => {
                        view.dispatch(ViewAction::HandleError);
                        report(&*toaster, "personalized_feed", &e);
                        return;
                    }
                };

                let mut ids: BTreeSet<String> = profile
                    .iter()
                    .flat_map(|p| p.following_ids())
                    .map(str::to_string)
                    .collect();
                ids.insert(viewer.clone());

                // The author set and its subscription change together.
                let mut current = lock(&swapped);
                if current.authors.as_ref() == Some(&ids) {
                    return;
                }

                tracing::debug!(viewer = %viewer, authors = ids.len(), "Resubscribing personalized feed");
                let mine = generation.fetch_add(1, Ordering::SeqCst) + 1;
                let fold = fold_posts(view.clone(), toaster.clone(), "personalized_feed");
                let live = generation.clone();
                let next = posts.subscribe(
                    PostRepository::authors_query(ids.iter().map(String::as_str)),
                    move |result| {
                        // Results from a replaced author set are stale.
                        if live.load(Ordering::SeqCst) == mine {
                            fold(result);
                        }
                    },
                );
                current.authors = Some(ids);
                if let Some(previous) = current.subscription.replace(next) {
                    previous.dispose();
                }
            }
        };

        let profile_subscription = self.profiles.subscribe(viewer_id, listener);
        FeedView {
            view,
            subscriptions: vec![profile_subscription],
            swapped: Some(swapped),
        }
    }

    /// Write a new post and return it.
    ///
    /// The author's display fields are copied onto the post; later profile
    /// edits do not change it.
    pub async fn submit_post(&self, author: &AuthorSnapshot, draft: PostDraft) -> AppResult<Post> {
        let result = self.submit_post_inner(author, draft).await;
        reported(&*self.toaster, "submit_post", result)
    }

    async fn submit_post_inner(&self, author: &AuthorSnapshot, draft: PostDraft) -> AppResult<Post> {
        if draft.is_empty() {
            return Err(AppError::Validation(
                "Write something or attach an image".to_string(),
            ));
        }

        let post = Post {
            id: self.id_gen.generate(),
            uid: author.uid.clone(),
            name: author.name.clone(),
            logo: Some(
                author
                    .avatar
                    .clone()
                    .unwrap_or_else(|| self.default_avatar.clone()),
            ),
            email: author.email.clone(),
            text: draft.text,
            image: draft.image,
            created_at: self.posts.server_time(),
            tags: draft.tags,
        };

        self.posts.create(&post).await?;
        tracing::info!(post_id = %post.id, uid = %post.uid, "Created post");
        Ok(post)
    }

    /// Delete a post on behalf of `requester_id`.
    ///
    /// Only the author can delete a post. Requests from anyone else, and
    /// requests for posts that no longer exist, succeed without doing
    /// anything.
    pub async fn delete_post(&self, requester_id: &str, post_id: &str) -> AppResult<()> {
        let result = self.delete_post_inner(requester_id, post_id).await;
        reported(&*self.toaster, "delete_post", result)
    }

    async fn delete_post_inner(&self, requester_id: &str, post_id: &str) -> AppResult<()> {
        let Some(post) = self.posts.find_by_id(post_id).await? else {
            tracing::debug!(post_id, "Post already gone");
            return Ok(());
        };

        if post.uid != requester_id {
            tracing::debug!(post_id, requester_id, "Ignoring delete by non-author");
            return Ok(());
        }

        self.posts.delete(post_id).await?;
        tracing::info!(post_id, "Deleted post");
        Ok(())
    }
}
