//! Backend handles shared by every client service.

use std::sync::Arc;

use socialsync_common::{AppResult, Config};
use socialsync_db::repositories::{
    CommentRepository, LikeRepository, PostRepository, ProfileRepository,
};
use socialsync_db::{DocumentStoreService, MemoryStore};

use super::blob::{self, BlobService};
use super::composer::PostComposer;
use super::feed::FeedSynchronizer;
use super::identity::{IdentityService, MemoryIdentityProvider};
use super::interaction::PostInteractionManager;
use super::media::MediaUploader;
use super::navigation::Navigator;
use super::profile_graph::ProfileGraphManager;
use super::session::{SessionActions, SessionWatcher};
use super::toast::ToasterService;

/// The three capabilities plus configuration, passed explicitly to every
/// service the client builds.
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<Config>,
    pub store: DocumentStoreService,
    pub identity: IdentityService,
    pub blob: BlobService,
    pub toaster: ToasterService,
    pub navigator: Navigator,
}

impl ClientContext {
    /// Bundle existing backends.
    #[must_use]
    pub fn new(
        config: Config,
        store: DocumentStoreService,
        identity: IdentityService,
        blob: BlobService,
        toaster: ToasterService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            identity,
            blob,
            toaster,
            navigator: Navigator::default(),
        }
    }

    /// In-process document store and identity provider, with the blob
    /// backend chosen by configuration.
    pub fn in_memory(
        config: Config,
        toaster: ToasterService,
    ) -> AppResult<(Self, MemoryStore, MemoryIdentityProvider)> {
        let store = MemoryStore::new();
        let identity = MemoryIdentityProvider::new();
        let blob = blob::from_config(&config.storage)?;
        let context = Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(identity.clone()),
            blob,
            toaster,
        );
        Ok((context, store, identity))
    }

    #[must_use]
    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.store.clone())
    }

    #[must_use]
    pub fn posts(&self) -> PostRepository {
        PostRepository::new(self.store.clone())
    }

    /// Start tracking the session. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start_session(&self) -> SessionWatcher {
        SessionWatcher::start(
            &self.identity,
            self.profiles(),
            self.toaster.clone(),
            self.navigator.clone(),
        )
    }

    #[must_use]
    pub fn session_actions(&self) -> SessionActions {
        SessionActions::new(self.identity.clone(), self.profiles(), self.toaster.clone())
    }

    #[must_use]
    pub fn feed(&self) -> FeedSynchronizer {
        FeedSynchronizer::new(
            self.posts(),
            self.profiles(),
            self.toaster.clone(),
            self.config.app.default_avatar_url.clone(),
        )
    }

    #[must_use]
    pub fn graph(&self) -> ProfileGraphManager {
        ProfileGraphManager::new(
            self.profiles(),
            self.posts(),
            self.toaster.clone(),
            self.config.feed.directory_limit,
        )
    }

    #[must_use]
    pub fn interactions(&self) -> PostInteractionManager {
        PostInteractionManager::new(
            LikeRepository::new(self.store.clone()),
            self.posts(),
            CommentRepository::new(self.store.clone()),
            self.toaster.clone(),
        )
    }

    #[must_use]
    pub fn uploader(&self) -> MediaUploader {
        MediaUploader::new(self.blob.clone(), self.toaster.clone())
    }

    #[must_use]
    pub fn composer(&self) -> PostComposer {
        PostComposer::new(self.feed(), self.uploader(), self.config.tagging.clone())
    }
}
