//! Session tracking.
//!
//! [`SessionWatcher`] follows the identity provider and keeps the signed-in
//! user's profile document live. [`SessionActions`] are the sign-in,
//! registration and sign-out operations the login and signup screens call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use socialsync_common::{AppError, AppResult};
use socialsync_db::Subscription;
use socialsync_db::entities::Profile;
use socialsync_db::repositories::ProfileRepository;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use validator::Validate;

use super::identity::{Identity, IdentityProfile, IdentityService, PASSWORD_PROVIDER};
use super::navigation::{Navigator, Route};
use super::toast::{ToasterService, report, reported};

/// A signed-in identity and its profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    /// `None` until the profile could be read or created.
    pub profile: Option<Profile>,
}

impl Session {
    /// Display name, preferring the identity's over the profile's.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.identity
            .display_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.profile.as_ref().map(|p| p.name.clone()))
            .unwrap_or_default()
    }

    /// Avatar URL, preferring the identity's over the profile's.
    #[must_use]
    pub fn avatar(&self) -> Option<String> {
        self.identity
            .photo_url
            .clone()
            .or_else(|| self.profile.as_ref().and_then(|p| p.image.clone()))
    }
}

/// What the client knows about the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// The provider has not reported yet.
    #[default]
    Pending,
    SignedOut,
    SignedIn(Session),
}

impl SessionState {
    /// The session, when signed in.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }
}

/// Tracks the current identity and its live profile.
///
/// Identity changes are handled one at a time, in the order the provider
/// reports them, on a background task. Must be started inside a Tokio
/// runtime.
pub struct SessionWatcher {
    state: watch::Receiver<SessionState>,
    identity_subscription: Subscription,
    worker: JoinHandle<()>,
}

impl SessionWatcher {
    /// Subscribe to the identity provider and start handling changes.
    pub fn start(
        identity: &IdentityService,
        profiles: ProfileRepository,
        toaster: ToasterService,
        navigator: Navigator,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel::<Option<Identity>>();
        let (state_tx, state_rx) = watch::channel(SessionState::Pending);

        let identity_subscription = identity.on_identity_change(Arc::new(move |change| {
            if events_tx.send(change).is_err() {
                tracing::debug!("Session watcher stopped; dropping identity change");
            }
        }));

        let worker = tokio::spawn(run(
            events_rx,
            Arc::new(state_tx),
            profiles,
            toaster,
            navigator,
        ));

        Self {
            state: state_rx,
            identity_subscription,
            worker,
        }
    }

    /// Receive every session change.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// The current session state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait until the provider's latest report has been handled.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.state.clone();
        match rx.wait_for(|s| *s != SessionState::Pending).await {
            Ok(state) => state.clone(),
            Err(_) => self.current(),
        }
    }

    /// Stop following the provider and release the profile subscription.
    pub async fn stop(self) {
        self.identity_subscription.dispose();
        // The worker exits once the event channel closes.
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "Session worker ended abnormally");
        }
    }
}

async fn run(
    mut events: mpsc::UnboundedReceiver<Option<Identity>>,
    state: Arc<watch::Sender<SessionState>>,
    profiles: ProfileRepository,
    toaster: ToasterService,
    navigator: Navigator,
) {
    let mut profile_subscription: Option<Subscription> = None;

    while let Some(change) = events.recv().await {
        if let Some(previous) = profile_subscription.take() {
            previous.dispose();
        }

        let Some(identity) = change else {
            state.send_replace(SessionState::SignedOut);
            navigator.navigate(Route::Login);
            continue;
        };

        let profile = match resolve_profile(&profiles, &identity).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                report(&*toaster, "load_profile", &e);
                None
            }
        };

        // Publish first: the subscription's first snapshot may be newer than
        // what was just read and must land on the signed-in session.
        let uid = identity.uid.clone();
        state.send_replace(SessionState::SignedIn(Session { identity, profile }));

        let live_state = state.clone();
        let live_toaster = toaster.clone();
        let live_uid = uid.clone();
        profile_subscription = Some(profiles.subscribe(&uid, move |result| match result {
            Ok(Some(profile)) => {
                live_state.send_if_modified(|current| match current {
                    SessionState::SignedIn(session)
                        if session.identity.uid == live_uid
                            && session.profile.as_ref() != Some(&profile) =>
                    {
                        session.profile = Some(profile.clone());
                        true
                    }
                    _ => false,
                });
            }
            Ok(None) => tracing::debug!(uid = %live_uid, "Profile not written yet"),
            Err(e) => report(&*live_toaster, "watch_profile", &e),
        }));
        navigator.navigate(Route::Home);
    }

    if let Some(subscription) = profile_subscription {
        subscription.dispose();
    }
}

/// Read the identity's profile, creating it from the identity on first sign-in.
async fn resolve_profile(profiles: &ProfileRepository, identity: &Identity) -> AppResult<Profile> {
    if let Some(profile) = profiles.find_by_uid(&identity.uid).await? {
        return Ok(profile);
    }

    let name = identity
        .display_name
        .clone()
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let profile = Profile {
        email: identity.email.clone(),
        image: identity.photo_url.clone(),
        auth_provider: Some(identity.provider_id.clone()),
        ..Profile::new(identity.uid.clone(), name)
    };

    match profiles.create(&profile).await {
        Ok(()) => {
            tracing::info!(uid = %profile.uid, "Created profile");
            Ok(profile)
        }
        // Someone else (registration) wrote it first.
        Err(AppError::Conflict(_)) => profiles.get_by_uid(&identity.uid).await,
        Err(e) => Err(e),
    }
}

/// Login form input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Invalid Input Fields"))]
    pub email: String,
    #[validate(length(min = 6, message = "Invalid Input Fields"))]
    pub password: String,
}

/// Signup form input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 4, message = "Name must be at least 4 characters"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
    /// URL of an already uploaded avatar.
    #[serde(default)]
    pub image: Option<String>,
}

/// Sign-in, registration and sign-out.
#[derive(Clone)]
pub struct SessionActions {
    identity: IdentityService,
    profiles: ProfileRepository,
    toaster: ToasterService,
    in_flight: Arc<AtomicBool>,
}

impl SessionActions {
    /// Create the actions.
    #[must_use]
    pub fn new(identity: IdentityService, profiles: ProfileRepository, toaster: ToasterService) -> Self {
        Self {
            identity,
            profiles,
            toaster,
            in_flight: Arc::default(),
        }
    }

    /// Whether a sign-in or registration is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Sign in through the federated popup.
    pub async fn sign_in_with_popup(&self) -> AppResult<Identity> {
        self.set_loading(true);
        let result = self.identity.sign_in_with_popup().await;
        self.set_loading(false);
        reported(&*self.toaster, "sign_in_with_popup", result)
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(&self, input: &LoginInput) -> AppResult<Identity> {
        if let Err(e) = input.validate() {
            let err = AppError::from(e);
            report(&*self.toaster, "sign_in_with_password", &err);
            return Err(err);
        }

        self.set_loading(true);
        let result = self
            .identity
            .sign_in_with_password(&input.email, &input.password)
            .await;
        self.set_loading(false);
        reported(&*self.toaster, "sign_in_with_password", result)
    }

    /// Create an account, sign it in and write its full profile.
    pub async fn register(&self, input: &RegisterInput) -> AppResult<Identity> {
        self.set_loading(true);
        let result = self.register_inner(input).await;
        self.set_loading(false);
        reported(&*self.toaster, "register", result)
    }

    async fn register_inner(&self, input: &RegisterInput) -> AppResult<Identity> {
        input.validate()?;

        let identity = self
            .identity
            .register(
                &input.email,
                &input.password,
                IdentityProfile {
                    display_name: Some(input.name.clone()),
                    photo_url: input.image.clone(),
                },
            )
            .await?;

        let profile = Profile {
            email: Some(input.email.clone()),
            image: input.image.clone(),
            bio: input.bio.clone().filter(|b| !b.trim().is_empty()),
            auth_provider: Some(PASSWORD_PROVIDER.to_string()),
            ..Profile::new(identity.uid.clone(), input.name.clone())
        };
        self.profiles.save(&profile).await?;
        tracing::info!(uid = %identity.uid, "Registered user");

        Ok(identity)
    }

    /// End the session.
    pub async fn sign_out(&self) -> AppResult<()> {
        let result = self.identity.sign_out().await;
        reported(&*self.toaster, "sign_out", result)
    }

    fn set_loading(&self, loading: bool) {
        self.in_flight.store(loading, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::identity::{IdentityProvider, MemoryIdentityProvider};
    use crate::services::toast::RecordingToaster;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use socialsync_db::{
        Document, DocumentListener, DocumentStore, MemoryStore, Query, QueryListener,
    };

    struct Harness {
        provider: MemoryIdentityProvider,
        store: MemoryStore,
        profiles: ProfileRepository,
        toaster: RecordingToaster,
        navigator: Navigator,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryStore::new();
            Self {
                provider: MemoryIdentityProvider::new(),
                profiles: ProfileRepository::new(Arc::new(store.clone())),
                store,
                toaster: RecordingToaster::new(),
                navigator: Navigator::default(),
            }
        }

        fn watcher(&self) -> SessionWatcher {
            let identity: IdentityService = Arc::new(self.provider.clone());
            SessionWatcher::start(
                &identity,
                self.profiles.clone(),
                Arc::new(self.toaster.clone()),
                self.navigator.clone(),
            )
        }

        fn actions(&self) -> SessionActions {
            SessionActions::new(
                Arc::new(self.provider.clone()),
                self.profiles.clone(),
                Arc::new(self.toaster.clone()),
            )
        }
    }

    fn register_input(name: &str, email: &str) -> RegisterInput {
        RegisterInput {
            name: name.to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            bio: Some("hello".to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_signed_out_at_start() {
        let harness = Harness::new();
        let watcher = harness.watcher();
        assert_eq!(watcher.settled().await, SessionState::SignedOut);
        assert_eq!(harness.navigator.current(), Route::Login);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_popup_sign_in_creates_profile() {
        let harness = Harness::new();
        let watcher = harness.watcher();
        let mut state = watcher.state();

        let identity = harness.provider.popup_identity("Ann Lee", "ann@example.com");
        harness.provider.set_popup_identity(Some(identity.clone()));
        harness.actions().sign_in_with_popup().await.unwrap();

        let state = state.wait_for(SessionState::is_signed_in).await.unwrap().clone();
        let session = state.session().unwrap();
        let profile = session.profile.as_ref().unwrap();
        assert_eq!(profile.name, "Ann Lee");
        assert_eq!(profile.auth_provider.as_deref(), Some("popup"));
        assert!(profile.following.is_empty());
        assert_eq!(harness.navigator.current(), Route::Home);

        let stored = harness.profiles.get_by_uid(&identity.uid).await.unwrap();
        assert_eq!(&stored, profile);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_existing_profile_is_not_overwritten() {
        let harness = Harness::new();
        let identity = harness.provider.popup_identity("Ann", "ann@example.com");
        let mut existing = Profile::new(identity.uid.clone(), "Annie");
        existing.bio = Some("kept".to_string());
        harness.profiles.save(&existing).await.unwrap();

        let watcher = harness.watcher();
        let mut state = watcher.state();
        harness.provider.set_popup_identity(Some(identity));
        harness.actions().sign_in_with_popup().await.unwrap();

        let state = state.wait_for(SessionState::is_signed_in).await.unwrap().clone();
        let profile = state.session().unwrap().profile.clone().unwrap();
        assert_eq!(profile.name, "Annie");
        assert_eq!(profile.bio.as_deref(), Some("kept"));
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_profile_changes_flow_into_session() {
        let harness = Harness::new();
        let watcher = harness.watcher();
        let mut state = watcher.state();
        let identity = harness
            .actions()
            .register(&register_input("Annie", "ann@example.com"))
            .await
            .unwrap();
        state.wait_for(SessionState::is_signed_in).await.unwrap();

        let bob = Profile::new("u2", "Bob").as_follow_entry();
        harness
            .profiles
            .set_following(&identity.uid, &[bob])
            .await
            .unwrap();

        let state = state
            .wait_for(|s| {
                s.session()
                    .and_then(|s| s.profile.as_ref())
                    .is_some_and(|p| p.follows("u2"))
            })
            .await
            .unwrap()
            .clone();
        assert_eq!(state.session().unwrap().profile.as_ref().unwrap().bio.as_deref(), Some("hello"));
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_sign_out_releases_profile_subscription() {
        let harness = Harness::new();
        let watcher = harness.watcher();
        let mut state = watcher.state();
        harness
            .actions()
            .register(&register_input("Annie", "ann@example.com"))
            .await
            .unwrap();
        state.wait_for(SessionState::is_signed_in).await.unwrap();
        assert_eq!(harness.store.active_subscriptions(), 1);

        harness.actions().sign_out().await.unwrap();
        state
            .wait_for(|s| *s == SessionState::SignedOut)
            .await
            .unwrap();
        assert_eq!(harness.store.active_subscriptions(), 0);
        assert_eq!(harness.navigator.current(), Route::Login);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_login_never_reaches_provider() {
        let harness = Harness::new();
        let input = LoginInput {
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
        };
        let result = harness.actions().sign_in_with_password(&input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(harness.toaster.errors(), vec!["Invalid Input Fields"]);
        assert!(harness.provider.current().is_none());
    }

    #[tokio::test]
    async fn test_register_validation_and_provider_errors_are_toasted() {
        let harness = Harness::new();
        let actions = harness.actions();

        let short = actions.register(&register_input("Ann", "ann@example.com")).await;
        assert!(matches!(short, Err(AppError::Validation(_))));

        actions
            .register(&register_input("Annie", "ann@example.com"))
            .await
            .unwrap();
        let dup = actions
            .register(&register_input("Annie", "ann@example.com"))
            .await;
        assert_eq!(dup.unwrap_err().error_code(), "auth/email-already-in-use");

        assert_eq!(
            harness.toaster.errors(),
            vec![
                "Name must be at least 4 characters",
                "An account with this email already exists",
            ]
        );
        assert!(!actions.is_loading());
    }

    #[tokio::test]
    async fn test_stop_disposes_everything() {
        let harness = Harness::new();
        let watcher = harness.watcher();
        harness
            .actions()
            .register(&register_input("Annie", "ann@example.com"))
            .await
            .unwrap();
        watcher
            .state()
            .wait_for(SessionState::is_signed_in)
            .await
            .unwrap();

        watcher.stop().await;
        assert_eq!(harness.store.active_subscriptions(), 0);

        // Later identity changes go nowhere.
        harness.provider.sign_out().await.unwrap();
    }

    /// Store where a fuller profile write lands right after a profile is
    /// first created, as when signup's own save races the sign-in path.
    struct LateSaveStore {
        inner: MemoryStore,
        late_bio: String,
    }

    #[async_trait::async_trait]
    impl DocumentStore for LateSaveStore {
        async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
            self.inner.query(collection, query).await
        }

        async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
            self.inner.get(collection, id).await
        }

        async fn create(&self, collection: &str, id: &str, mut data: Value) -> AppResult<()> {
            self.inner.create(collection, id, data.clone()).await?;
            if collection == "users" {
                data["bio"] = Value::String(self.late_bio.clone());
                self.inner.set(collection, id, data).await?;
            }
            Ok(())
        }

        async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()> {
            self.inner.set(collection, id, data).await
        }

        async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()> {
            self.inner.update(collection, id, patch).await
        }

        async fn array_append(
            &self,
            collection: &str,
            id: &str,
            field: &str,
            values: Vec<Value>,
        ) -> AppResult<()> {
            self.inner.array_append(collection, id, field, values).await
        }

        async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
            self.inner.delete(collection, id).await
        }

        fn subscribe(&self, collection: &str, query: Query, listener: QueryListener) -> Subscription {
            self.inner.subscribe(collection, query, listener)
        }

        fn subscribe_doc(
            &self,
            collection: &str,
            id: &str,
            listener: DocumentListener,
        ) -> Subscription {
            self.inner.subscribe_doc(collection, id, listener)
        }

        fn server_time(&self) -> DateTime<Utc> {
            self.inner.server_time()
        }
    }

    #[tokio::test]
    async fn test_profile_written_before_subscribe_reaches_session() {
        let provider = MemoryIdentityProvider::new();
        let store = LateSaveStore {
            inner: MemoryStore::new(),
            late_bio: "Hiking and tea".to_string(),
        };
        let profiles = ProfileRepository::new(Arc::new(store));
        let identity_service: IdentityService = Arc::new(provider.clone());
        let watcher = SessionWatcher::start(
            &identity_service,
            profiles,
            Arc::new(RecordingToaster::new()),
            Navigator::default(),
        );
        let mut state = watcher.state();

        provider.set_popup_identity(Some(provider.popup_identity("Ann Lee", "ann@example.com")));
        provider.sign_in_with_popup().await.unwrap();

        let bio_of = |s: &SessionState| {
            s.session()
                .and_then(|session| session.profile.as_ref())
                .and_then(|profile| profile.bio.clone())
        };
        let settled = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            state.wait_for(|s| bio_of(s).is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(bio_of(&settled).as_deref(), Some("Hiking and tea"));
        watcher.stop().await;
    }
}
