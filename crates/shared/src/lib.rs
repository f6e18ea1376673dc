//! Shared types, error model, and configuration for CoralIngest.
//!
//! This crate is the foundation depended on by all other CoralIngest crates.
//! It provides:
//! - [`CoralIngestError`] — the unified error type
//! - Domain types ([`ListingRecord`], [`ListingImage`], [`RawDetailBag`], [`DealType`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FallbacksConfig, GeocodeConfig, RunConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CoralIngestError, Result};
pub use types::{DealType, ListingImage, ListingRecord, RawDetailBag, fold_turkish};
