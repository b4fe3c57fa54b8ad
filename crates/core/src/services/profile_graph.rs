//! Follow graph and user directory.
//!
//! A user's follow list lives on their own profile document as an array of
//! entries caching the followed user's name and avatar. Following appends to
//! that array in one store operation; unfollowing rewrites it.

use std::sync::Arc;

use serde::Deserialize;
use socialsync_common::{AppError, AppResult};
use socialsync_db::Subscription;
use socialsync_db::entities::{FollowEntry, Profile};
use socialsync_db::repositories::{PostRepository, ProfilePatch, ProfileRepository};
use tokio::sync::watch;
use validator::Validate;

use super::toast::{ToasterService, report, reported};

/// Profile fields a user can edit.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 4, message = "Name must be at least 4 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
    /// URL of an already uploaded avatar.
    pub image: Option<String>,
}

/// What the profile page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub profile: Profile,
    pub post_count: usize,
    pub following_count: usize,
}

/// Live follow status of one viewer towards one target.
pub struct FollowStatusWatch {
    status: watch::Receiver<bool>,
    subscription: Subscription,
}

impl FollowStatusWatch {
    /// Current status.
    #[must_use]
    pub fn is_following(&self) -> bool {
        *self.status.borrow()
    }

    /// Receive every status change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.status.clone()
    }

    /// Stop listening.
    pub fn close(self) {
        self.subscription.dispose();
    }
}

/// Manages who follows whom.
#[derive(Clone)]
pub struct ProfileGraphManager {
    profiles: ProfileRepository,
    posts: PostRepository,
    toaster: ToasterService,
    directory_limit: usize,
}

impl ProfileGraphManager {
    /// Create a profile graph manager.
    #[must_use]
    pub fn new(
        profiles: ProfileRepository,
        posts: PostRepository,
        toaster: ToasterService,
        directory_limit: usize,
    ) -> Self {
        Self {
            profiles,
            posts,
            toaster,
            directory_limit,
        }
    }

    /// Whether `profile` follows `target_id`.
    #[must_use]
    pub fn is_following(profile: &Profile, target_id: &str) -> bool {
        profile.follows(target_id)
    }

    /// Append `target` to the viewer's follow list.
    ///
    /// The append is a single store operation, so concurrent follows of
    /// different users all land. There is no check for an existing entry:
    /// following twice leaves two entries.
    pub async fn follow(&self, viewer_id: &str, target: &FollowEntry) -> AppResult<()> {
        let result = self.follow_inner(viewer_id, target).await;
        reported(&*self.toaster, "follow", result)
    }

    async fn follow_inner(&self, viewer_id: &str, target: &FollowEntry) -> AppResult<()> {
        if viewer_id == target.id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        self.profiles.append_following(viewer_id, target).await?;

        tracing::info!(follower_id = %viewer_id, followee_id = %target.id, "Followed user");
        Ok(())
    }

    /// Remove every entry for `target_id` from the viewer's follow list.
    ///
    /// Read-modify-write without a transaction: a follow appended between
    /// the read and the write is lost.
    pub async fn unfollow(&self, viewer_id: &str, target_id: &str) -> AppResult<()> {
        let result = self.unfollow_inner(viewer_id, target_id).await;
        reported(&*self.toaster, "unfollow", result)
    }

    async fn unfollow_inner(&self, viewer_id: &str, target_id: &str) -> AppResult<()> {
        let viewer = self.profiles.get_by_uid(viewer_id).await?;
        let following: Vec<FollowEntry> = viewer
            .following
            .into_iter()
            .filter(|f| f.id != target_id)
            .collect();
        self.profiles.set_following(viewer_id, &following).await?;

        tracing::info!(follower_id = %viewer_id, followee_id = %target_id, "Unfollowed user");
        Ok(())
    }

    /// Follow or unfollow depending on the current status; returns the new one.
    pub async fn toggle_follow(&self, viewer_id: &str, target: &FollowEntry) -> AppResult<bool> {
        let viewer = reported(
            &*self.toaster,
            "toggle_follow",
            self.profiles.get_by_uid(viewer_id).await,
        )?;

        if Self::is_following(&viewer, &target.id) {
            self.unfollow(viewer_id, &target.id).await?;
            Ok(false)
        } else {
            self.follow(viewer_id, target).await?;
            Ok(true)
        }
    }

    /// Keep "does the viewer follow the target" live.
    #[must_use]
    pub fn watch_follow_status(&self, viewer_id: &str, target_id: &str) -> FollowStatusWatch {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let toaster = self.toaster.clone();
        let target = target_id.to_string();

        let subscription = self.profiles.subscribe(viewer_id, move |result| match result {
            Ok(profile) => {
                let following = profile.is_some_and(|p| Self::is_following(&p, &target));
                tx.send_if_modified(|current| {
                    let changed = *current != following;
                    *current = following;
                    changed
                });
            }
            Err(e) => report(&*toaster, "follow_status", &e),
        });

        FollowStatusWatch {
            status: rx,
            subscription,
        }
    }

    /// Every profile, for the user directory.
    pub async fn list_users(&self) -> AppResult<Vec<Profile>> {
        reported(
            &*self.toaster,
            "list_users",
            self.profiles.list(self.directory_limit).await,
        )
    }

    /// Edit a profile. Posts already written keep the old author fields.
    pub async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> AppResult<()> {
        let result = self.update_profile_inner(uid, update).await;
        reported(&*self.toaster, "update_profile", result)
    }

    async fn update_profile_inner(&self, uid: &str, update: ProfileUpdate) -> AppResult<()> {
        update.validate()?;
        let patch = ProfilePatch {
            name: update.name,
            bio: update.bio,
            image: update.image,
        };
        self.profiles.update(uid, &patch).await?;
        tracing::info!(uid, "Updated profile");
        Ok(())
    }

    /// Profile with post and follow counts.
    pub async fn profile_summary(&self, uid: &str) -> AppResult<ProfileSummary> {
        let result = async {
            let profile = self.profiles.get_by_uid(uid).await?;
            let post_count = self.posts.count_by_author(uid).await?;
            Ok(ProfileSummary {
                following_count: profile.following.len(),
                profile,
                post_count,
            })
        }
        .await;
        reported(&*self.toaster, "profile_summary", result)
    }
}
