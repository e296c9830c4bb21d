//! Core types and service wiring for the hentedag waste schedule resolver.

/// Norwegian date parsing and formatting helpers.
pub mod dates;
/// Fallback-chain discovery of the provider serving an address.
pub mod discovery;
/// Domain models and identifiers shared by all providers.
pub mod model;
/// Normalization of provider label vocabularies.
pub mod normalize;
/// Registry and helpers for plugging providers into the service.
pub mod plugin;
/// Traits describing the provider interfaces.
pub mod ports;
/// Next-pickup resolution across categories.
pub mod resolve;
/// High-level service facade used by clients.
pub mod service;

pub use discovery::*;
pub use model::*;
pub use normalize::*;
pub use plugin::*;
pub use ports::*;
pub use resolve::*;
pub use service::*;
