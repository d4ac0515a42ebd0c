//! Shared types, error model, and configuration for Newsdesk.
//!
//! This crate is the foundation depended on by all other Newsdesk crates.
//! It provides:
//! - [`NewsdeskError`], the unified error type
//! - Domain types ([`ContentItem`], [`SyncStage`], id derivation)
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentConfig, HttpConfig, SourceConfig, SourceKind, StorageConfig, SyncConfig,
    SyncPolicyConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, resolve_db_path,
};
pub use error::{NewsdeskError, Result};
pub use types::{ContentItem, DEFAULT_CATEGORY, SyncStage, canonical_id, compute_hash};
