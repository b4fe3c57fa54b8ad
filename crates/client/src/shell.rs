//! Interactive shell over the client services.

use std::sync::Arc;

use bytes::Bytes;
use socialsync_common::{AppError, AppResult, AuthErrorKind, Config};
use socialsync_core::toast::report;
use socialsync_core::{
    AuthorSnapshot, ClientContext, IdentityProvider, LoginInput, MemoryIdentityProvider,
    PostComposer,
    ProfileUpdate, RecordingToaster, RegisterInput, Route, Session, SessionActions,
    SessionState, SessionWatcher, ToastLevel, UserRef,
};
use socialsync_db::MemoryStore;
use socialsync_db::entities::Post;

use crate::command::{Command, HELP};

/// Whether the shell should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Client state for one interactive session.
pub struct Shell {
    context: ClientContext,
    store: MemoryStore,
    identity: MemoryIdentityProvider,
    toaster: RecordingToaster,
    watcher: SessionWatcher,
    actions: SessionActions,
    composer: PostComposer,
    toasts_shown: usize,
}

fn format_post(post: &Post) -> String {
    let mut line = format!("[{}] {}: {}", post.id, post.name, post.text);
    if let Some(image) = &post.image {
        line.push_str(&format!(" <{image}>"));
    }
    if !post.tags.is_empty() {
        line.push_str(&format!(" with {}", post.tags.join(", ")));
    }
    line
}

impl Shell {
    /// Build the in-memory backends and start tracking the session.
    pub fn start(config: Config) -> AppResult<Self> {
        let toaster = RecordingToaster::new();
        let (context, store, identity) =
            ClientContext::in_memory(config, Arc::new(toaster.clone()))?;
        let watcher = context.start_session();
        let actions = context.session_actions();
        let composer = context.composer();
        Ok(Self {
            context,
            store,
            identity,
            toaster,
            watcher,
            actions,
            composer,
            toasts_shown: 0,
        })
    }

    /// Greeting shown at startup.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("{}: type help for commands", self.context.config.app.name)
    }

    /// Wait until the session reflects the provider's current identity.
    pub async fn settle(&self) -> SessionState {
        let expected = self.identity.current().map(|i| i.uid);
        let mut state = self.watcher.state();
        let settled = state
            .wait_for(|s| match (s, &expected) {
                (SessionState::SignedIn(session), Some(uid)) => session.identity.uid == *uid,
                (SessionState::SignedOut, None) => true,
                _ => false,
            })
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| self.watcher.current())
    }

    /// The current page, as a prompt.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("{}> ", self.context.navigator.current())
    }

    /// Toasts shown since the last call.
    pub fn drain_toasts(&mut self) -> Vec<String> {
        let toasts = self.toaster.toasts();
        let fresh = toasts
            .iter()
            .skip(self.toasts_shown)
            .map(|t| match t.level {
                ToastLevel::Success => format!("ok: {}", t.message),
                ToastLevel::Error => format!("error: {}", t.message),
            })
            .collect();
        self.toasts_shown = toasts.len();
        fresh
    }

    fn session(&self) -> Option<Session> {
        let session = self.watcher.current().session().cloned();
        if session.is_none() {
            report(
                &*self.context.toaster,
                "require_session",
                &AppError::Auth(AuthErrorKind::NotSignedIn),
            );
        }
        session
    }

    /// Run one command and return the lines to print.
    pub async fn execute(&mut self, command: Command) -> (Flow, Vec<String>) {
        let mut out = Vec::new();
        match command {
            Command::Help => out.push(HELP.to_string()),
            Command::Quit => return (Flow::Quit, out),
            Command::Signup {
                name,
                email,
                password,
                bio,
            } => {
                let input = RegisterInput {
                    name,
                    email,
                    password,
                    bio,
                    image: None,
                };
                if self.actions.register(&input).await.is_ok() {
                    self.settle().await;
                    out.push(format!("Welcome, {}", input.name));
                }
            }
            Command::Login { email, password } => {
                let input = LoginInput { email, password };
                if self.actions.sign_in_with_password(&input).await.is_ok() {
                    self.settle().await;
                    out.push("Signed in".to_string());
                }
            }
            Command::Google { name, email } => {
                self.identity
                    .set_popup_identity(Some(self.identity.popup_identity(&name, &email)));
                if self.actions.sign_in_with_popup().await.is_ok() {
                    self.settle().await;
                    out.push(format!("Signed in as {name}"));
                }
            }
            Command::Logout => {
                if self.actions.sign_out().await.is_ok() {
                    self.settle().await;
                    self.composer.cancel();
                    out.push("Signed out".to_string());
                }
            }
            Command::Go(route) => {
                let signed_in = self.watcher.current().is_signed_in();
                let shown = self.context.navigator.guard(route, signed_in);
                if shown != route {
                    out.push(format!("Sign in to see {route}"));
                }
                match shown {
                    Route::Home => self.show_feed(&mut out),
                    Route::AllUsers => self.show_users(&mut out).await,
                    Route::Profile => self.show_profile(&mut out).await,
                    Route::Login | Route::Signup => {}
                }
            }
            Command::Image {
                path,
                width,
                height,
            } => {
                if self.session().is_none() {
                    return (Flow::Continue, out);
                }
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match tokio::fs::read(&path).await {
                    Ok(data) => {
                        if let Ok(url) = self
                            .composer
                            .attach_image(&file_name, Bytes::from(data), width, height)
                            .await
                        {
                            out.push(format!("Attached {url} ({}%)", self.composer.upload_progress()));
                        }
                    }
                    Err(e) => report(&*self.context.toaster, "read_file", &AppError::from(e)),
                }
            }
            Command::Tag { x, y, uid } => self.tag(x, y, &uid, &mut out).await,
            Command::Cancel => {
                self.composer.cancel();
                out.push("Draft discarded".to_string());
            }
            Command::Post(text) => {
                if let Some(session) = self.session() {
                    self.composer.set_text(text);
                    let author = AuthorSnapshot::from_session(&session);
                    if let Ok(post) = self.composer.submit(&author).await {
                        out.push(format!("Posted {}", format_post(&post)));
                    }
                }
            }
            Command::Feed => {
                if self.session().is_some() {
                    self.show_feed(&mut out);
                }
            }
            Command::All => {
                if self.session().is_some() {
                    self.show_users(&mut out).await;
                }
            }
            Command::Follow(uid) => self.follow(&uid, true, &mut out).await,
            Command::Unfollow(uid) => self.follow(&uid, false, &mut out).await,
            Command::Like(post_id) => {
                if let Some(session) = self.session() {
                    let post = self
                        .context
                        .interactions()
                        .mount(&post_id, &session.identity.uid)
                        .await;
                    if let Ok(liked) = post.toggle_like().await {
                        let verb = if liked { "Liked" } else { "Unliked" };
                        out.push(format!("{verb} {post_id} ({} likes)", post.like_count()));
                    }
                    post.unmount();
                }
            }
            Command::Comment { post_id, text } => {
                if let Some(session) = self.session() {
                    let thread = self
                        .context
                        .interactions()
                        .mount_comments(&post_id, AuthorSnapshot::from_session(&session));
                    if thread.submit(&text).await.is_ok() {
                        out.push(format!("{} comments", thread.comments().len()));
                    }
                    thread.unmount();
                }
            }
            Command::Comments(post_id) => {
                if let Some(session) = self.session() {
                    let thread = self
                        .context
                        .interactions()
                        .mount_comments(&post_id, AuthorSnapshot::from_session(&session));
                    let comments = thread.comments();
                    if comments.is_empty() {
                        out.push("No comments yet".to_string());
                    }
                    for comment in comments {
                        out.push(format!("{}: {}", comment.name, comment.text));
                    }
                    thread.unmount();
                }
            }
            Command::Delete(post_id) => {
                if let Some(session) = self.session()
                    && self
                        .context
                        .feed()
                        .delete_post(&session.identity.uid, &post_id)
                        .await
                        .is_ok()
                {
                    out.push(format!("Delete requested for {post_id}"));
                }
            }
            Command::Profile => {
                if self.session().is_some() {
                    self.show_profile(&mut out).await;
                }
            }
            Command::Bio(bio) => {
                if let Some(session) = self.session() {
                    let update = ProfileUpdate {
                        bio: Some(bio),
                        ..Default::default()
                    };
                    if self
                        .context
                        .graph()
                        .update_profile(&session.identity.uid, update)
                        .await
                        .is_ok()
                    {
                        out.push("Profile updated".to_string());
                    }
                }
            }
        }
        (Flow::Continue, out)
    }

    async fn tag(&mut self, x: i32, y: i32, uid: &str, out: &mut Vec<String>) {
        if self.session().is_none() {
            return;
        }
        let Ok(users) = self.context.graph().list_users().await else {
            return;
        };
        let Some(user) = users.into_iter().find(|p| p.uid == uid) else {
            out.push(format!("No user {uid}"));
            return;
        };

        let overlay = self.composer.overlay_mut();
        if !overlay.click(x, y) {
            out.push("Attach an image first".to_string());
            return;
        }
        overlay.select(UserRef {
            uid: user.uid,
            name: user.name,
        });
        overlay.confirm();
        for (name, position) in overlay.render_positions() {
            out.push(format!("{name} at ({}, {})", position.x, position.y));
        }
    }

    async fn follow(&self, target_id: &str, follow: bool, out: &mut Vec<String>) {
        let Some(session) = self.session() else {
            return;
        };
        let graph = self.context.graph();
        let viewer = &session.identity.uid;

        let result = if follow {
            match self.context.profiles().get_by_uid(target_id).await {
                Ok(target) => graph.follow(viewer, &target.as_follow_entry()).await,
                Err(e) => {
                    report(&*self.context.toaster, "follow", &e);
                    return;
                }
            }
        } else {
            graph.unfollow(viewer, target_id).await
        };

        if result.is_ok() {
            let verb = if follow { "Following" } else { "Unfollowed" };
            out.push(format!("{verb} {target_id}"));
        }
    }

    fn show_feed(&self, out: &mut Vec<String>) {
        let Some(session) = self.watcher.current().session().cloned() else {
            return;
        };
        let view = self.context.feed().personalized(&session.identity.uid);
        let posts = view.posts();
        view.close();

        if posts.is_empty() {
            out.push("Nothing here yet; follow someone or post".to_string());
        }
        out.extend(posts.iter().map(format_post));
    }

    async fn show_users(&self, out: &mut Vec<String>) {
        let Some(session) = self.watcher.current().session().cloned() else {
            return;
        };
        let Ok(users) = self.context.graph().list_users().await else {
            return;
        };
        for user in users {
            let status = if user.uid == session.identity.uid {
                " (you)"
            } else if session
                .profile
                .as_ref()
                .is_some_and(|p| p.follows(&user.uid))
            {
                " (following)"
            } else {
                ""
            };
            out.push(format!("{} {}{status}", user.uid, user.name));
        }
    }

    async fn show_profile(&self, out: &mut Vec<String>) {
        let Some(session) = self.watcher.current().session().cloned() else {
            return;
        };
        let uid = &session.identity.uid;
        let Ok(summary) = self.context.graph().profile_summary(uid).await else {
            return;
        };

        out.push(summary.profile.name.clone());
        if let Some(email) = &summary.profile.email {
            out.push(email.clone());
        }
        if let Some(bio) = &summary.profile.bio {
            out.push(bio.clone());
        }
        out.push(format!(
            "{} posts, following {}",
            summary.post_count, summary.following_count
        ));

        let view = self.context.feed().author_feed(uid);
        out.extend(view.posts().iter().map(format_post));
        view.close();
    }

    /// Release every subscription.
    pub async fn shutdown(self) {
        self.watcher.stop().await;
        tracing::debug!(
            remaining = self.store.active_subscriptions(),
            "Closed session"
        );
    }
}
