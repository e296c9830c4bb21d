//! Hub-facing device layer for the hentedag waste schedule resolver.

/// Per-device poll loop writing resolver output into the hub.
pub mod device;
/// Boundary traits for the host hub platform.
pub mod platform;
/// Trigger-time handling for the pickup-tomorrow flow card.
pub mod trigger;

pub use device::*;
pub use platform::*;
pub use trigger::*;
