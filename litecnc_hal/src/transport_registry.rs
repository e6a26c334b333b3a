//! Transport registry.
//!
//! Provides a `TransportRegistry` struct for registering and retrieving
//! transport factories by name. It is built at startup and handed to
//! `HalCore`; there is no global state.

use litecnc_common::hal::config::BoardConfig;
use litecnc_common::hal::driver::{HalError, Transport, TransportFactory};
use std::collections::HashMap;

use crate::drivers::register_all_transports;

/// Registry of available transports.
pub struct TransportRegistry {
    factories: HashMap<&'static str, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in transport.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_all_transports(&mut registry);
        registry
    }

    /// Register a transport factory.
    ///
    /// # Panics
    /// Panics if a transport with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: TransportFactory) {
        if self.factories.contains_key(name) {
            panic!("Transport '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a transport factory by name.
    pub fn get_factory(&self, name: &str) -> Option<TransportFactory> {
        self.factories.get(name).copied()
    }

    /// Create a transport for `config` by name.
    ///
    /// # Errors
    /// Returns `HalError::TransportNotFound` if no transport with the given
    /// name is registered.
    pub fn create_transport(
        &self,
        name: &str,
        config: &BoardConfig,
    ) -> Result<Box<dyn Transport>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::TransportNotFound(name.to_string()))?;
        Ok(factory(config))
    }

    /// List all registered transport names, sorted.
    pub fn list_transports(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
