//! Common utilities and shared types for socialsync.
//!
//! This crate provides foundational components used across all socialsync crates:
//!
//! - **Configuration**: Client settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based document identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use socialsync_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    AppConfig, Config, FeedConfig, StorageBackendKind, StorageConfig, TaggingConfig,
};
pub use error::{AppError, AppResult, AuthErrorKind};
pub use id::IdGenerator;
