use std::sync::Arc;

/// Quantity held by a string register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    Voltage,
    Current,
}

/// Register surface of a parent inverter or ESS.
///
/// Implementations own the transport and are responsible for bounding every
/// read with their own timeout. Values are returned already scaled to
/// engineering units (V, A).
pub trait ParentDevice: Send + Sync {
    fn id(&self) -> &str;

    fn read_register(&self, address: u16, kind: RegisterKind) -> anyhow::Result<f64>;

    /// The device reports an internal fault and must not be read from
    fn is_faulted(&self) -> bool {
        false
    }
}

/// Handle shared by the registry and every charger bound to the device
pub type DeviceHandle = Arc<dyn ParentDevice>;

/// Lookup of live devices by component id
pub trait DeviceRegistry: Send + Sync {
    fn lookup(&self, id: &str) -> Option<DeviceHandle>;
}
