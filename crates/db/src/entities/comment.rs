//! Comment document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment under `posts/{post_id}/comments`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,

    /// Commenter name at submit time
    #[serde(default)]
    pub name: String,

    /// Commenter avatar at submit time
    #[serde(default)]
    pub image: Option<String>,

    #[serde(rename = "comment")]
    pub text: String,

    pub created_at: DateTime<Utc>,
}
