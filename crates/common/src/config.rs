//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Client presentation settings.
    #[serde(default)]
    pub app: AppConfig,
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Image tagging overlay settings.
    #[serde(default)]
    pub tagging: TaggingConfig,
    /// Feed and directory settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Client presentation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Name shown in greetings.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Avatar used when an author has none.
    #[serde(default = "default_avatar_url")]
    pub default_avatar_url: String,
}

/// Which object storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Keep uploaded objects in process memory.
    Memory,
    /// Write uploaded objects under `base_path`.
    Local,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackendKind,
    /// Base directory for the local backend.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// Public URL prefix objects are served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bytes written per upload step; progress is reported once per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Image tagging overlay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggingConfig {
    /// Horizontal limit annotations are drawn within.
    #[serde(default = "default_render_width")]
    pub render_width: i32,
    /// Vertical limit annotations are drawn within.
    #[serde(default = "default_render_height")]
    pub render_height: i32,
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Maximum number of profiles returned by the user directory.
    #[serde(default = "default_directory_limit")]
    pub directory_limit: usize,
}

fn default_app_name() -> String {
    "SocialSync".to_string()
}

fn default_avatar_url() -> String {
    "/assets/default-avatar.jpeg".to_string()
}

const fn default_storage_backend() -> StorageBackendKind {
    StorageBackendKind::Memory
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_base_url() -> String {
    "http://localhost:3000/files/".to_string()
}

const fn default_chunk_size() -> usize {
    256 * 1024
}

const fn default_render_width() -> i32 {
    400
}

const fn default_render_height() -> i32 {
    350
}

const fn default_directory_limit() -> usize {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            default_avatar_url: default_avatar_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            base_path: default_base_path(),
            base_url: default_base_url(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            render_width: default_render_width(),
            render_height: default_render_height(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            directory_limit: default_directory_limit(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SOCIALSYNC_ENV`)
    /// 3. Environment variables with `SOCIALSYNC__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SOCIALSYNC_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SOCIALSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SOCIALSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
