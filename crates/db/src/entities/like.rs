//! Like document.

use serde::{Deserialize, Serialize};

/// A like under `posts/{post_id}/likes`, keyed by the liking user's ID so a
/// user holds at most one like per post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    /// Liking user's identity ID.
    pub id: String,
}
