//! Web crawler for a single site.
//!
//! This crate provides:
//! - [`engine`]: concurrent, scope-aware BFS crawler yielding [`FetchedResource`]s
//! - [`same_host_links`]: outbound link extraction for pages ingested outside a crawl

pub mod engine;

pub use engine::{CrawlResult, Crawler, FetchedResource, same_host_links};
