/*!
 * Directory of discovered devices.
 *
 * Devices are kept in discovery order and never removed. Only the gateway
 * driver adds devices; callers get read access.
 */
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use tracing::info;

use malos_core::error::{Error, Result};
use malos_devices::driver::ConfigPusher;

use crate::device::ZigbeeDevice;

/// Discovered devices of one gateway
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: Arc<RwLock<Vec<Arc<ZigbeeDevice>>>>,
}

impl DeviceDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<ZigbeeDevice>>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<ZigbeeDevice>>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All devices in discovery order
    pub fn devices(&self) -> Vec<Arc<ZigbeeDevice>> {
        self.read().clone()
    }

    /// The device at a node and endpoint
    pub fn get(&self, node_id: u32, endpoint_index: u32) -> Result<Arc<ZigbeeDevice>> {
        self.read()
            .iter()
            .find(|device| device.node_id() == node_id && device.endpoint_index() == endpoint_index)
            .cloned()
            .ok_or(Error::InvalidCommandTarget {
                node_id,
                endpoint_index,
            })
    }

    /// The first discovered device
    pub fn first(&self) -> Option<Arc<ZigbeeDevice>> {
        self.read().first().cloned()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no device was discovered yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Add devices that are not known yet; returns how many were added
    pub(crate) fn import(&self, pairs: &[(u32, u32)], pusher: &ConfigPusher) -> usize {
        let mut devices = self.write();
        let mut added = 0;

        for &(node_id, endpoint_index) in pairs {
            let known = devices
                .iter()
                .any(|device| device.node_id() == node_id && device.endpoint_index() == endpoint_index);
            if !known {
                info!("Added device at node {} endpoint {}", node_id, endpoint_index);
                devices.push(Arc::new(ZigbeeDevice::new(node_id, endpoint_index, pusher.clone())));
                added += 1;
            }
        }

        added
    }
}
