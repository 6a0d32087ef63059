//! Shared types, error model, and configuration for sitegraph.
//!
//! This crate is the foundation depended on by all other sitegraph crates.
//! It provides:
//! - [`SiteGraphError`]: the unified error type
//! - Domain types ([`Resource`], [`Token`], [`TagClass`], [`GraphFragment`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`TaggerConfig`], config loading)

pub mod config;
pub mod error;
pub mod graph;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, StorageSection, TaggerConfig, TaggerSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SiteGraphError};
pub use graph::{GraphFragment, GraphNode, GraphRelationship, RELATES_TO, union_into};
pub use types::{Resource, ResourceId, ResourceType, TagClass, Token};
