/*!
 * Driver registry for the MALOS client.
 *
 * Maps each driver kind to the function constructing its behavior. The set
 * of kinds is closed; a declared driver whose name is not one of them is
 * rejected before any of its channels is opened.
 */
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use malos_core::error::{Error, Result};
use malos_core::types::{DriverDescriptor, DriverKind};
use malos_devices::driver::{DriverContext, SharedDriver};
use malos_devices::drivers::{EverloopDriver, HumidityDriver, UvDriver};
use malos_zigbee::ZigbeeDriver;

/// Constructs the behavior of one driver instance
pub type DriverFactory = fn(DriverContext) -> SharedDriver;

/// Driver registry
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<DriverKind, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in driver
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DriverKind::Humidity, |ctx| Arc::new(HumidityDriver::new(ctx)));
        registry.register(DriverKind::Uv, |ctx| Arc::new(UvDriver::new(ctx)));
        registry.register(DriverKind::Everloop, |ctx| Arc::new(EverloopDriver::new(ctx)));
        registry.register(DriverKind::Zigbee, |ctx| Arc::new(ZigbeeDriver::new(ctx)));
        registry
    }

    /// Register a factory for a kind, returning the one it replaces
    pub fn register(&mut self, kind: DriverKind, factory: DriverFactory) -> Option<DriverFactory> {
        debug!("Registered factory for {} drivers", kind);
        self.factories.insert(kind, factory)
    }

    /// Kinds that have a factory
    pub fn kinds(&self) -> Vec<DriverKind> {
        DriverKind::ALL
            .into_iter()
            .filter(|kind| self.factories.contains_key(kind))
            .collect()
    }

    /// Find the factory for a declared driver
    pub fn resolve(&self, descriptor: &DriverDescriptor) -> Result<DriverFactory> {
        let kind = descriptor.kind()?;
        self.factories
            .get(&kind)
            .copied()
            .ok_or_else(|| Error::unknown_driver(&descriptor.name))
    }

    /// Create the behavior of the driver described by `ctx`
    pub fn create(&self, ctx: DriverContext) -> Result<SharedDriver> {
        let factory = self.resolve(&ctx.descriptor)?;
        Ok(factory(ctx))
    }
}
