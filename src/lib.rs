//! Charger component for GoodWe battery inverters.
//!
//! A charger represents the one or two PV strings wired to a single MPPT
//! port of a parent inverter/ESS. Each cycle it binds to the parent, reads
//! the strings' voltage and current registers, aggregates them and
//! publishes a [`ChargerSnapshot`].

pub mod aggregate;
pub mod binding;
pub mod charger;
pub mod config;
pub mod mqtt;
pub mod port;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod traits;

pub use aggregate::ChargerMeasurement;
pub use binding::{BindingState, ParentDeviceBinding};
pub use charger::{ChargerComponent, ChargerSnapshot, ChargerState};
pub use config::{ChargerConfig, ComponentIds, ConfigError};
pub use mqtt::MqttPublisher;
pub use port::{MpptPort, PvString, StringAddress, StringSet};
pub use reader::{StringReading, read_strings};
pub use registry::StaticRegistry;
pub use scheduler::{ChargerHandle, SchedulerOptions};
pub use traits::{DeviceHandle, DeviceRegistry, ParentDevice, RegisterKind};
