//! Typed repositories over the document capability.

pub mod comment;
pub mod like;
pub mod post;
pub mod profile;

pub use comment::CommentRepository;
pub use like::LikeRepository;
pub use post::PostRepository;
pub use profile::{ProfilePatch, ProfileRepository};

use serde::de::DeserializeOwned;
use socialsync_common::AppResult;

use crate::store::Document;

/// Decode a result set, failing on the first malformed document.
fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> AppResult<Vec<T>> {
    docs.iter().map(Document::decode).collect()
}
