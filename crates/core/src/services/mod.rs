//! Client services.

#![allow(missing_docs)]

pub mod blob;
pub mod comment;
pub mod composer;
pub mod context;
pub mod feed;
pub mod identity;
pub mod interaction;
pub mod media;
pub mod navigation;
pub mod profile_graph;
pub mod session;
pub mod tagging;
pub mod toast;
pub mod view_reducer;

pub use blob::{BlobService, BlobStore, LocalBlobStore, MemoryBlobStore, UploadProgress};
pub use comment::CommentThread;
pub use composer::PostComposer;
pub use context::ClientContext;
pub use feed::{AuthorSnapshot, FeedSynchronizer, FeedView, PostDraft};
pub use identity::{
    Identity, IdentityListener, IdentityProfile, IdentityProvider, IdentityService,
    MemoryIdentityProvider,
};
pub use interaction::{PostInteractionManager, PostInteractions};
pub use media::{MediaKind, MediaUploader};
pub use navigation::{Navigator, Route};
pub use profile_graph::{FollowStatusWatch, ProfileGraphManager, ProfileSummary, ProfileUpdate};
pub use session::{
    LoginInput, RegisterInput, Session, SessionActions, SessionState, SessionWatcher,
};
pub use tagging::{Position, StagedImage, TaggedUser, TaggingOverlay, UserRef};
pub use toast::{RecordingToaster, Toast, ToastLevel, Toaster, ToasterService};
pub use view_reducer::{ViewAction, ViewState, ViewStore};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex shared with subscription listeners, recovering from poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
