//! Boundary traits for the host hub platform.
//!
//! The device layer never talks to a concrete hub directly; everything it
//! needs is expressed through these traits so the same poll logic drives a
//! real hub, a console mirror, or a test double.

use async_trait::async_trait;
use tracing::warn;

use hentedag_core::model::AddressBinding;

/// Settings key under which the discovery result is persisted.
pub const BINDING_KEY: &str = "address_binding";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Value written into a hub capability.
pub enum CapabilityValue {
    /// Numeric sensor value.
    Integer(i64),
    /// Display string.
    Text(String),
    /// Cleared value, shown as “unknown” by hubs.
    Empty,
}

#[derive(thiserror::Error, Debug)]
/// Errors reported by the hub platform.
pub enum PlatformError {
    /// A capability operation was rejected.
    #[error("Capability rejected: {0}")]
    Capability(String),
    /// The settings store failed to persist a value.
    #[error("Settings store failure: {0}")]
    Settings(String),
    /// A flow trigger could not be fired.
    #[error("Flow trigger failure: {0}")]
    Flow(String),
    /// A token could not be written or removed.
    #[error("Token store failure: {0}")]
    Token(String),
}

#[async_trait]
/// Capability surface of one hub device.
pub trait CapabilityStore: Send + Sync {
    /// Whether the capability is registered on the device.
    async fn has_capability(&self, id: &str) -> bool;

    /// Register a capability.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the hub rejects the capability.
    async fn add_capability(&self, id: &str) -> Result<(), PlatformError>;

    /// Remove a capability and its value.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the hub rejects the removal.
    async fn remove_capability(&self, id: &str) -> Result<(), PlatformError>;

    /// Write a capability value.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the value cannot be written.
    async fn set_value(&self, id: &str, value: CapabilityValue) -> Result<(), PlatformError>;

    /// Update the unit text shown beside a capability value.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the options cannot be updated.
    async fn set_units(&self, id: &str, units: &str) -> Result<(), PlatformError>;
}

#[async_trait]
/// Named flow tokens shared with the hub's automation layer.
pub trait TokenStore: Send + Sync {
    /// Create or update a token.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the token cannot be written.
    async fn set_token(&self, name: &str, value: &str) -> Result<(), PlatformError>;

    /// Remove a token, typically on device teardown.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the token cannot be removed.
    async fn unregister_token(&self, name: &str) -> Result<(), PlatformError>;
}

#[async_trait]
/// Flow trigger cards the device can fire.
pub trait FlowTrigger: Send + Sync {
    /// Fire a trigger card with the given `(token, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the card cannot be fired.
    async fn trigger(&self, card: &str, tokens: &[(String, String)]) -> Result<(), PlatformError>;
}

#[async_trait]
/// Persistent per-device key/value settings.
pub trait SettingsStore: Send + Sync {
    /// Read a stored value.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the value cannot be persisted.
    async fn set(&self, key: &str, value: String) -> Result<(), PlatformError>;
}

/// Full hub surface a device needs, implemented by any type providing all
/// four stores.
pub trait HubDevice: CapabilityStore + TokenStore + FlowTrigger + SettingsStore {}

impl<T> HubDevice for T where T: CapabilityStore + TokenStore + FlowTrigger + SettingsStore {}

/// Persist the discovery result for the device's lifetime.
///
/// # Errors
///
/// Returns a [`PlatformError`] when serialization or the store fails.
pub async fn store_binding(
    store: &dyn SettingsStore,
    binding: &AddressBinding,
) -> Result<(), PlatformError> {
    let raw = serde_json::to_string(binding)
        .map_err(|error| PlatformError::Settings(error.to_string()))?;
    store.set(BINDING_KEY, raw).await
}

/// Load the binding written at pairing time, if any.
///
/// A stored value that no longer deserializes is treated as absent so the
/// device can be re-paired instead of failing every poll.
pub async fn load_binding(store: &dyn SettingsStore) -> Option<AddressBinding> {
    let raw = store.get(BINDING_KEY).await?;
    match serde_json::from_str(&raw) {
        Ok(binding) => Some(binding),
        Err(error) => {
            warn!(error = %error, "stored address binding is unreadable");
            None
        }
    }
}
