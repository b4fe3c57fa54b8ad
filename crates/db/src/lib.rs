//! Document layer for socialsync.
//!
//! - [`store`]: the document capability consumed by the client
//! - [`memory`]: an in-process implementation with live subscriptions
//! - [`entities`]: document models for profiles, posts, likes and comments
//! - [`repositories`]: typed access to each collection

pub mod entities;
pub mod memory;
pub mod repositories;
pub mod store;
pub mod subscription;

pub use memory::MemoryStore;
pub use store::{
    Direction, Document, DocumentListener, DocumentStore, DocumentStoreService, Filter, OrderBy,
    Query, QueryListener,
};
pub use subscription::Subscription;
