use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::traits::{DeviceHandle, DeviceRegistry};

/// In-process registry of parent devices, keyed by component id
#[derive(Default)]
pub struct StaticRegistry {
    devices: RwLock<HashMap<String, DeviceHandle>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device under its own id, replacing any previous one.
    pub fn register(&self, device: DeviceHandle) {
        let id = device.id().to_string();
        info!(device = %id, "Registering parent device");
        // A poisoned lock still holds a consistent map
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        devices.insert(id, device);
    }

    pub fn remove(&self, id: &str) -> Option<DeviceHandle> {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        let removed = devices.remove(id);
        if removed.is_some() {
            info!(device = %id, "Removed parent device");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeviceRegistry for StaticRegistry {
    fn lookup(&self, id: &str) -> Option<DeviceHandle> {
        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        let found = devices.get(id).cloned();
        if found.is_none() {
            debug!(device = %id, "Parent device not registered");
        }
        found
    }
}
