//! Profile repository.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use socialsync_common::{AppError, AppResult};

use crate::entities::profile::{self, FollowEntry, Profile};
use crate::store::{DocumentStoreService, Query};
use crate::subscription::Subscription;

/// Fields a profile edit may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Profile repository for document operations.
#[derive(Clone)]
pub struct ProfileRepository {
    store: DocumentStoreService,
}

impl ProfileRepository {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(store: DocumentStoreService) -> Self {
        Self { store }
    }

    /// Find a profile by identity ID.
    pub async fn find_by_uid(&self, uid: &str) -> AppResult<Option<Profile>> {
        self.store
            .get(profile::COLLECTION, uid)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Get a profile by identity ID, failing if absent.
    pub async fn get_by_uid(&self, uid: &str) -> AppResult<Profile> {
        self.find_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {uid}")))
    }

    /// Create a profile; fails with `Conflict` if one exists.
    pub async fn create(&self, profile: &Profile) -> AppResult<()> {
        self.store
            .create(profile::COLLECTION, &profile.uid, serde_json::to_value(profile)?)
            .await
    }

    /// Create or replace a profile.
    pub async fn save(&self, profile: &Profile) -> AppResult<()> {
        self.store
            .set(profile::COLLECTION, &profile.uid, serde_json::to_value(profile)?)
            .await
    }

    /// Apply a partial edit.
    pub async fn update(&self, uid: &str, patch: &ProfilePatch) -> AppResult<()> {
        self.store
            .update(profile::COLLECTION, uid, serde_json::to_value(patch)?)
            .await
    }

    /// Overwrite the follow list.
    pub async fn set_following(&self, uid: &str, following: &[FollowEntry]) -> AppResult<()> {
        self.store
            .update(profile::COLLECTION, uid, json!({ "following": following }))
            .await
    }

    /// Append one entry to the follow list in a single write.
    pub async fn append_following(&self, uid: &str, entry: &FollowEntry) -> AppResult<()> {
        self.store
            .array_append(
                profile::COLLECTION,
                uid,
                "following",
                vec![serde_json::to_value(entry)?],
            )
            .await
    }

    /// List profiles, up to `limit`.
    pub async fn list(&self, limit: usize) -> AppResult<Vec<Profile>> {
        let docs = self
            .store
            .query(profile::COLLECTION, &Query::new().limit(limit))
            .await?;
        super::decode_all(&docs)
    }

    /// Keep a profile live.
    pub fn subscribe<F>(&self, uid: &str, listener: F) -> Subscription
    where
        F: Fn(AppResult<Option<Profile>>) + Send + Sync + 'static,
    {
        self.store.subscribe_doc(
            profile::COLLECTION,
            uid,
            Arc::new(move |result| {
                listener(result.and_then(|doc| doc.map(|d| d.decode()).transpose()));
            }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn repo() -> ProfileRepository {
        ProfileRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_find_missing() {
        assert!(repo().find_by_uid("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let result = repo().get_by_uid("nobody").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_patch_leaves_other_fields() {
        let repo = repo();
        let mut profile = Profile::new("u1", "Ann");
        profile.bio = Some("old".to_string());
        profile.email = Some("ann@example.com".to_string());
        repo.save(&profile).await.unwrap();

        repo.update(
            "u1",
            &ProfilePatch {
                bio: Some("new".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stored = repo.get_by_uid("u1").await.unwrap();
        assert_eq!(stored.bio.as_deref(), Some("new"));
        assert_eq!(stored.name, "Ann");
        assert_eq!(stored.email.as_deref(), Some("ann@example.com"));
    }

    #[tokio::test]
    async fn test_set_following() {
        let repo = repo();
        repo.save(&Profile::new("u1", "Ann")).await.unwrap();
        let bob = Profile::new("u2", "Bob").as_follow_entry();
        repo.set_following("u1", &[bob.clone()]).await.unwrap();

        assert_eq!(repo.get_by_uid("u1").await.unwrap().following, vec![bob]);
    }

    #[tokio::test]
    async fn test_append_following_keeps_order() {
        let repo = repo();
        repo.save(&Profile::new("u1", "Ann")).await.unwrap();
        let bob = Profile::new("u2", "Bob").as_follow_entry();
        let cyd = Profile::new("u3", "Cyd").as_follow_entry();
        repo.append_following("u1", &bob).await.unwrap();
        repo.append_following("u1", &cyd).await.unwrap();

        assert_eq!(
            repo.get_by_uid("u1").await.unwrap().following,
            vec![bob.clone(), cyd]
        );
        let missing = repo.append_following("ghost", &bob).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
