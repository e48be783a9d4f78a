use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::traits::{DeviceHandle, DeviceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingState {
    Unbound,
    Bound,
    ParentUnavailable,
}

/// Association between a charger and its parent inverter.
///
/// Holds a non-owning share of the registry's handle; the parent is only
/// ever read through it.
pub struct ParentDeviceBinding {
    parent_id: String,
    state: BindingState,
    handle: Option<DeviceHandle>,
}

impl ParentDeviceBinding {
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            state: BindingState::Unbound,
            handle: None,
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    /// Bound handle, `None` unless the state is `Bound`
    pub fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    /// Resolves the parent through the registry. Never fails: a missing,
    /// faulted or panicking parent yields `ParentUnavailable`.
    pub fn bind(&mut self, registry: &dyn DeviceRegistry) -> BindingState {
        let lookup = panic::catch_unwind(AssertUnwindSafe(|| {
            registry
                .lookup(&self.parent_id)
                .map(|device| {
                    let faulted = device.is_faulted();
                    (device, faulted)
                })
        }));
        match lookup {
            Err(_) => self.mark_unavailable("registry lookup panicked"),
            Ok(Some((_, true))) => {
                self.mark_unavailable("parent reports a fault");
            }
            Ok(Some((device, false))) => {
                let same = self
                    .handle
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &device));
                if same {
                    debug!(parent = %self.parent_id, "Parent still bound");
                } else {
                    match self.state {
                        BindingState::Bound => {
                            info!(parent = %self.parent_id, "Parent device replaced, rebinding")
                        }
                        BindingState::ParentUnavailable => {
                            info!(parent = %self.parent_id, "Parent device recovered")
                        }
                        BindingState::Unbound => {
                            info!(parent = %self.parent_id, "Bound to parent device")
                        }
                    }
                    self.handle = Some(device);
                    self.state = BindingState::Bound;
                }
            }
            Ok(None) => self.mark_unavailable("parent not found in registry"),
        }
        self.state
    }

    /// Drops the parent reference and returns to `Unbound`
    pub fn release(&mut self) {
        if self.handle.take().is_some() {
            debug!(parent = %self.parent_id, "Released parent device");
        }
        self.state = BindingState::Unbound;
    }

    fn mark_unavailable(&mut self, reason: &str) {
        if self.state != BindingState::ParentUnavailable {
            warn!(parent = %self.parent_id, reason, "Parent device unavailable");
        }
        self.handle = None;
        self.state = BindingState::ParentUnavailable;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::registry::StaticRegistry;
    use crate::traits::{ParentDevice, RegisterKind};

    struct Inverter {
        faulted: AtomicBool,
    }

    impl Inverter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                faulted: AtomicBool::new(false),
            })
        }
    }

    impl ParentDevice for Inverter {
        fn id(&self) -> &str {
            "batteryInverter0"
        }

        fn read_register(&self, _address: u16, _kind: RegisterKind) -> anyhow::Result<f64> {
            Ok(0.0)
        }

        fn is_faulted(&self) -> bool {
            self.faulted.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn starts_unbound() {
        let binding = ParentDeviceBinding::new("batteryInverter0");
        assert_eq!(binding.state(), BindingState::Unbound);
        assert!(binding.handle().is_none());
    }

    #[test]
    fn missing_parent_is_unavailable() {
        let registry = StaticRegistry::new();
        let mut binding = ParentDeviceBinding::new("batteryInverter0");
        assert_eq!(binding.bind(&registry), BindingState::ParentUnavailable);
        assert!(binding.handle().is_none());
    }

    #[test]
    fn repeated_bind_keeps_same_handle() {
        let registry = StaticRegistry::new();
        registry.register(Inverter::new());
        let mut binding = ParentDeviceBinding::new("batteryInverter0");

        assert_eq!(binding.bind(&registry), BindingState::Bound);
        let first = binding.handle().cloned().unwrap();
        for _ in 0..5 {
            assert_eq!(binding.bind(&registry), BindingState::Bound);
            assert!(Arc::ptr_eq(binding.handle().unwrap(), &first));
        }
    }

    #[test]
    fn fault_and_recovery() {
        let registry = StaticRegistry::new();
        let inverter = Inverter::new();
        registry.register(inverter.clone());
        let mut binding = ParentDeviceBinding::new("batteryInverter0");
        binding.bind(&registry);

        inverter.faulted.store(true, Ordering::SeqCst);
        assert_eq!(binding.bind(&registry), BindingState::ParentUnavailable);
        assert!(binding.handle().is_none());

        inverter.faulted.store(false, Ordering::SeqCst);
        assert_eq!(binding.bind(&registry), BindingState::Bound);
    }

    struct PanickingRegistry;

    impl DeviceRegistry for PanickingRegistry {
        fn lookup(&self, _id: &str) -> Option<DeviceHandle> {
            panic!("registry bug");
        }
    }

    #[test]
    fn panicking_registry_is_unavailable() {
        let mut binding = ParentDeviceBinding::new("batteryInverter0");
        assert_eq!(binding.bind(&PanickingRegistry), BindingState::ParentUnavailable);
        assert!(binding.handle().is_none());
    }

    #[test]
    fn replaced_parent_is_rebound() {
        let registry = StaticRegistry::new();
        registry.register(Inverter::new());
        let mut binding = ParentDeviceBinding::new("batteryInverter0");
        binding.bind(&registry);
        let first = binding.handle().cloned().unwrap();

        registry.register(Inverter::new());
        assert_eq!(binding.bind(&registry), BindingState::Bound);
        assert!(!Arc::ptr_eq(binding.handle().unwrap(), &first));
    }

    #[test]
    fn release_returns_to_unbound() {
        let registry = StaticRegistry::new();
        registry.register(Inverter::new());
        let mut binding = ParentDeviceBinding::new("batteryInverter0");
        binding.bind(&registry);
        binding.release();
        assert_eq!(binding.state(), BindingState::Unbound);
        assert!(binding.handle().is_none());
    }
}
