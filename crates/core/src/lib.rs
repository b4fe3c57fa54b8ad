//! Live view synchronization for the socialsync client.
//!
//! Each service keeps a piece of local view state consistent with the
//! remote document store through live subscriptions, and writes user
//! actions straight back to the store.

pub mod services;

pub use services::*;
