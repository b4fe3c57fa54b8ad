//! Post document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding every post.
pub const COLLECTION: &str = "posts";

/// Field posts are ordered by.
pub const CREATED_AT: &str = "createdAt";

/// Field holding the author's identity ID.
pub const AUTHOR: &str = "uid";

/// Sub-collection of likes under a post.
#[must_use]
pub fn likes_path(post_id: &str) -> String {
    format!("{COLLECTION}/{post_id}/likes")
}

/// Sub-collection of comments under a post.
#[must_use]
pub fn comments_path(post_id: &str) -> String {
    format!("{COLLECTION}/{post_id}/comments")
}

/// A feed post.
///
/// Author display fields are a snapshot taken when the post was written;
/// later profile edits do not touch existing posts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Allocated by the client before the write.
    pub id: String,

    /// Author identity ID
    pub uid: String,

    /// Author name at submit time
    #[serde(default)]
    pub name: String,

    /// Author avatar at submit time
    #[serde(default)]
    pub logo: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub text: String,

    /// Attached image URL
    #[serde(default)]
    pub image: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Names of users tagged in the image
    #[serde(default)]
    pub tags: Vec<String>,
}
