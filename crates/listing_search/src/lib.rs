//! # Listing Search
//!
//! Client crate for the geo-indexed listing search provider. It defines the
//! query/result types exchanged with the provider, the [`SearchProvider`]
//! trait the discovery engine calls through, and the reqwest-backed HTTP
//! implementation.

/// Pool of client identities for request rotation
pub mod identity;

/// Provider trait and wire types
mod provider;
pub use provider::*;

/// HTTP implementation of the provider
mod client;
pub use client::*;
