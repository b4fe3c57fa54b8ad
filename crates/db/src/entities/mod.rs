//! Document models.
//!
//! Each model serializes to the JSON body stored under its collection.

pub mod comment;
pub mod like;
pub mod post;
pub mod profile;

pub use comment::Comment;
pub use like::Like;
pub use post::Post;
pub use profile::{FollowEntry, Profile};
