//! Core types and service wiring for the parkli parking availability aggregator.

/// Per-city adapter running the shared fetch, reconcile and cache flow.
pub mod adapter;
/// Time-bounded in-memory store for city aggregates.
pub mod cache;
/// HTTP transport with content-type dispatched decoding.
pub mod http;
/// Mapping of upstream keys to canonical facility ids.
pub mod identity;
/// Domain models and identifiers shared by all providers.
pub mod model;
/// XML and JSON decoders for upstream payloads.
pub mod parse;
/// Registry of city-specific sources.
pub mod plugin;
/// Traits describing the source interfaces and their errors.
pub mod ports;
/// Merging of live records with reference data.
pub mod reconcile;
/// Static reference dataset.
pub mod reference;
/// High-level service facade used by clients.
pub mod service;
/// Runtime settings.
pub mod settings;

pub use adapter::*;
pub use cache::*;
pub use http::*;
pub use identity::*;
pub use model::*;
pub use parse::*;
pub use plugin::*;
pub use ports::*;
pub use reconcile::*;
pub use reference::*;
pub use service::*;
pub use settings::*;
