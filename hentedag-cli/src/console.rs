//! Console stand-ins for the hub boundary, used by `discover` and `watch`.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use hentedag_core::discovery::ProgressSink;
use hentedag_hub::platform::{
    CapabilityStore, CapabilityValue, FlowTrigger, PlatformError, SettingsStore, TokenStore,
};

/// Progress sink printing discovery lines as a pairing UI would show them.
pub(crate) struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn progress(&self, message: &str) {
        println!("{message}");
    }
}

/// Hub stand-in that mirrors every device write to stdout and keeps
/// settings in memory for the session.
#[derive(Default)]
pub(crate) struct ConsoleHub {
    capabilities: Mutex<BTreeMap<String, CapabilityValue>>,
    settings: Mutex<BTreeMap<String, String>>,
}

fn render(value: &CapabilityValue) -> String {
    match value {
        CapabilityValue::Integer(number) => number.to_string(),
        CapabilityValue::Text(text) => text.clone(),
        CapabilityValue::Empty => "-".to_owned(),
    }
}

#[async_trait]
impl CapabilityStore for ConsoleHub {
    async fn has_capability(&self, id: &str) -> bool {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    async fn add_capability(&self, id: &str) -> Result<(), PlatformError> {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), CapabilityValue::Empty);
        Ok(())
    }

    async fn remove_capability(&self, id: &str) -> Result<(), PlatformError> {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    async fn set_value(&self, id: &str, value: CapabilityValue) -> Result<(), PlatformError> {
        println!("  {id} = {}", render(&value));
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), value);
        Ok(())
    }

    async fn set_units(&self, id: &str, units: &str) -> Result<(), PlatformError> {
        println!("  {id} [{units}]");
        Ok(())
    }
}

#[async_trait]
impl TokenStore for ConsoleHub {
    async fn set_token(&self, name: &str, value: &str) -> Result<(), PlatformError> {
        println!("  token {name} = {value}");
        Ok(())
    }

    async fn unregister_token(&self, name: &str) -> Result<(), PlatformError> {
        println!("  token {name} removed");
        Ok(())
    }
}

#[async_trait]
impl FlowTrigger for ConsoleHub {
    async fn trigger(&self, card: &str, tokens: &[(String, String)]) -> Result<(), PlatformError> {
        let rendered: Vec<String> = tokens
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("  flow {card} fired ({})", rendered.join(", "));
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for ConsoleHub {
    async fn get(&self, key: &str) -> Option<String> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PlatformError> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }
}
