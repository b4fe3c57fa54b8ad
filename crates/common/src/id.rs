//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for documents.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based document ID.
    ///
    /// Post and comment IDs are allocated on the client before the write so
    /// the document can carry its own ID.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque identity ID, in the shape issued by identity providers.
    #[must_use]
    pub fn generate_uid(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
