//! # Discovery Engine
//!
//! Coverage-first discovery of listings advertised by a geo-indexed search
//! provider. The provider silently truncates large result sets and varies
//! results by query parameters, so the engine combines adaptive quadtree
//! subdivision, multi-pass querying with varied parameters, rate-limited
//! retrying execution, deduplication, and resumable per-(cell, pass) caching
//! to get as close to complete coverage as the provider allows.

/// Spatial cell and campaign grid types
mod cell;
pub use cell::*;

/// Listing, call-record, and error types
mod types;
pub use types::*;

/// Immutable campaign configuration
mod config;
pub use config::*;

/// Per-(cell, pass) resumption cache
mod cache;
pub use cache::*;

/// Campaign-scoped engine state and the orchestrator
mod engine;
pub use engine::*;

/// Rate-limited retrying search execution
mod executor;

/// Post-hoc grid assignment for discovered listings
mod verifier;
pub use verifier::*;

/// Campaign statistics reduction
mod stats;
pub use stats::*;

/// Persisted campaign outputs
mod output;
pub use output::*;

/// Top-level campaign driver
mod campaign;
pub use campaign::*;

#[cfg(test)]
pub(crate) mod testutil;
