//! Profile document.

use serde::{Deserialize, Serialize};

/// Collection holding one profile per identity, keyed by identity ID.
pub const COLLECTION: &str = "users";

/// Application-level user record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Identity ID this profile belongs to.
    pub uid: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Avatar URL
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub bio: Option<String>,

    /// How the identity first signed in (`password`, `popup`).
    #[serde(default)]
    pub auth_provider: Option<String>,

    /// Users this profile follows, in the order they were followed.
    #[serde(default)]
    pub following: Vec<FollowEntry>,
}

impl Profile {
    /// A profile with no follows.
    #[must_use]
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            email: None,
            image: None,
            bio: None,
            auth_provider: None,
            following: Vec::new(),
        }
    }

    /// Whether any follow entry points at `target_id`.
    #[must_use]
    pub fn follows(&self, target_id: &str) -> bool {
        self.following.iter().any(|f| f.id == target_id)
    }

    /// IDs of followed users.
    pub fn following_ids(&self) -> impl Iterator<Item = &str> {
        self.following.iter().map(|f| f.id.as_str())
    }

    /// The follow entry other users cache when following this profile.
    #[must_use]
    pub fn as_follow_entry(&self) -> FollowEntry {
        FollowEntry {
            id: self.uid.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

/// A followed user, with display data cached at follow time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEntry {
    /// Followed user's identity ID.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}
