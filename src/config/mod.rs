//! Configuration module for a pipeline run
//!
//! This module provides the `PipelineConfig` struct and its builder
//! for configuring the crawl pool, site-visit sessions and storage retries
//! with validation and sensible defaults.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::PipelineConfigBuilder;
pub use types::PipelineConfig;
