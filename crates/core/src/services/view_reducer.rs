//! View state shared by feed, like and comment components.
//!
//! A component's displayed collections live in one [`ViewState`] value that
//! only changes through [`ViewState::reduce`]. Live subscriptions dispatch
//! whole result sets, so each action replaces its slice outright.

use std::sync::Arc;

use socialsync_db::entities::{Comment, Like, Post};
use tokio::sync::watch;

/// Collections a component displays, plus its error flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub likes: Vec<Like>,
    /// Latched once any operation feeding this view fails.
    pub error: bool,
}

/// State transitions.
#[derive(Debug, Clone)]
pub enum ViewAction {
    SubmitPosts(Vec<Post>),
    AddLikes(Vec<Like>),
    AddComments(Vec<Comment>),
    HandleError,
}

impl ViewAction {
    const fn name(&self) -> &'static str {
        match self {
            Self::SubmitPosts(_) => "submit_posts",
            Self::AddLikes(_) => "add_likes",
            Self::AddComments(_) => "add_comments",
            Self::HandleError => "handle_error",
        }
    }
}

impl ViewState {
    /// Apply one action.
    ///
    /// Collection actions replace their slice and leave the rest alone. The
    /// error flag is never cleared by a later success.
    #[must_use]
    pub fn reduce(self, action: ViewAction) -> Self {
        match action {
            ViewAction::SubmitPosts(posts) => Self { posts, ..self },
            ViewAction::AddLikes(likes) => Self { likes, ..self },
            ViewAction::AddComments(comments) => Self { comments, ..self },
            ViewAction::HandleError => Self {
                error: true,
                ..self
            },
        }
    }
}

/// Observable holder of one component's [`ViewState`].
///
/// Cloning yields another handle to the same state, so subscription
/// listeners can dispatch into the view their component reads from.
#[derive(Clone)]
pub struct ViewStore {
    state: Arc<watch::Sender<ViewState>>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    /// Create a store holding the empty state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Reduce the current state with `action` and notify watchers.
    pub fn dispatch(&self, action: ViewAction) {
        tracing::trace!(action = action.name(), "Dispatching view action");
        self.state.send_modify(|state| {
            *state = std::mem::take(state).reduce(action);
        });
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Whether the error flag has latched.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.state.borrow().error
    }

    /// Receive every future state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            uid: "u1".to_string(),
            name: "Ann".to_string(),
            logo: None,
            email: None,
            text: String::new(),
            image: None,
            created_at: Utc::now(),
            tags: vec![],
        }
    }

    fn like(id: &str) -> Like {
        Like { id: id.to_string() }
    }

    #[test]
    fn test_actions_replace_only_their_slice() {
        let state = ViewState::default()
            .reduce(ViewAction::SubmitPosts(vec![post("p1")]))
            .reduce(ViewAction::AddLikes(vec![like("u1"), like("u2")]))
            .reduce(ViewAction::AddLikes(vec![like("u2")]));

        assert_eq!(state.posts.len(), 1);
        assert_eq!(state.posts[0].id, "p1");
        assert_eq!(state.likes, vec![like("u2")]);
        assert!(state.comments.is_empty());
        assert!(!state.error);
    }

    #[test]
    fn test_error_latches() {
        let state = ViewState::default()
            .reduce(ViewAction::HandleError)
            .reduce(ViewAction::AddLikes(vec![like("u1")]))
            .reduce(ViewAction::SubmitPosts(vec![]));
        assert!(state.error);
        assert_eq!(state.likes.len(), 1);
    }

    #[test]
    fn test_store_dispatch_and_watch() {
        let store = ViewStore::new();
        let mut rx = store.watch();
        let other = store.clone();

        other.dispatch(ViewAction::AddLikes(vec![like("u1")]));

        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().likes, vec![like("u1")]);
        assert_eq!(store.snapshot().likes.len(), 1);
        assert!(!store.has_error());
    }
}
