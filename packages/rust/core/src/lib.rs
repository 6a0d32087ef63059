//! Core pipeline orchestration and domain logic for sitegraph.
//!
//! This crate ties together crawling, normalization, change detection,
//! tagging, graph extraction and persistence into end-to-end workflows
//! (see [`pipeline::Pipeline`]).

pub mod change;
pub mod extract;
pub mod persist;
pub mod pipeline;
