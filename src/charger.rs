use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::aggregate::ChargerMeasurement;
use crate::binding::{BindingState, ParentDeviceBinding};
use crate::config::{ChargerConfig, ConfigError};
use crate::port::StringSet;
use crate::reader::read_strings;
use crate::traits::DeviceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargerState {
    Disabled,
    Initializing,
    Active,
    Degraded,
}

impl ChargerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChargerState::Disabled => "Disabled",
            ChargerState::Initializing => "Initializing",
            ChargerState::Active => "Active",
            ChargerState::Degraded => "Degraded",
        }
    }
}

impl fmt::Display for ChargerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What downstream consumers see of a charger after each cycle.
///
/// In `Degraded` the last valid measurement is kept and flagged `stale`;
/// `measurement == None` means no valid data has been seen yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargerSnapshot {
    pub id: String,
    pub alias: String,
    pub state: ChargerState,
    pub binding: BindingState,
    pub measurement: Option<ChargerMeasurement>,
    pub stale: bool,
    /// Number of cycles executed so far
    pub cycle: u64,
}

/// Charger aggregating the strings of one MPPT port of a parent inverter.
///
/// Driven externally: every call to [`ChargerComponent::tick`] runs one
/// complete bind, read, aggregate and publish cycle.
pub struct ChargerComponent {
    config: ChargerConfig,
    registry: Arc<dyn DeviceRegistry>,
    binding: ParentDeviceBinding,
    strings: StringSet,
    enabled: bool,
    state: ChargerState,
    last_valid: Option<ChargerMeasurement>,
    cycle: u64,
    snapshot: ChargerSnapshot,
    publisher: watch::Sender<ChargerSnapshot>,
}

impl ChargerComponent {
    pub fn new(config: ChargerConfig, registry: Arc<dyn DeviceRegistry>) -> Result<Self, ConfigError> {
        config.validate()?;

        let enabled = config.enabled;
        let state = if enabled {
            ChargerState::Initializing
        } else {
            ChargerState::Disabled
        };
        let snapshot = ChargerSnapshot {
            id: config.id.clone(),
            alias: config.alias().to_string(),
            state,
            binding: BindingState::Unbound,
            measurement: None,
            stale: false,
            cycle: 0,
        };
        let (publisher, _) = watch::channel(snapshot.clone());

        info!(
            charger = %config.id,
            port = %config.mppt_port,
            parent = %config.parent_device_id,
            "Created charger"
        );

        Ok(Self {
            binding: ParentDeviceBinding::new(config.parent_device_id.clone()),
            strings: config.mppt_port.resolve(),
            config,
            registry,
            enabled,
            state,
            last_valid: None,
            cycle: 0,
            snapshot,
            publisher,
        })
    }

    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn state(&self) -> ChargerState {
        self.state
    }

    pub fn binding_state(&self) -> BindingState {
        self.binding.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn snapshot(&self) -> &ChargerSnapshot {
        &self.snapshot
    }

    /// Receiver of every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<ChargerSnapshot> {
        self.publisher.subscribe()
    }

    /// Enables or disables the charger.
    ///
    /// Disabling clears the measurement and releases the parent; enabling
    /// starts over from `Initializing`.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.transition(ChargerState::Initializing);
        } else {
            self.binding.release();
            self.last_valid = None;
            self.transition(ChargerState::Disabled);
        }
        self.publish();
    }

    /// Runs one cycle and publishes its outcome. Never fails.
    pub fn tick(&mut self) -> &ChargerSnapshot {
        if !self.enabled {
            return &self.snapshot;
        }
        self.cycle += 1;

        let binding = self.binding.bind(self.registry.as_ref());
        let readings = read_strings(&self.binding, self.strings);
        let measurement = ChargerMeasurement::from_readings(&readings);
        debug!(
            charger = %self.config.id,
            cycle = self.cycle,
            ?binding,
            ?readings,
            ?measurement,
            "Cycle complete"
        );

        let state = match binding {
            BindingState::Bound if measurement.valid => {
                self.last_valid = Some(measurement);
                ChargerState::Active
            }
            BindingState::Bound | BindingState::ParentUnavailable => ChargerState::Degraded,
            BindingState::Unbound => ChargerState::Initializing,
        };
        self.transition(state);
        self.publish();
        &self.snapshot
    }

    fn transition(&mut self, state: ChargerState) {
        if self.state != state {
            info!(charger = %self.config.id, from = %self.state, to = %state, "Charger state changed");
            self.state = state;
        }
    }

    fn publish(&mut self) {
        let (measurement, stale) = match self.state {
            ChargerState::Disabled | ChargerState::Initializing => (None, false),
            ChargerState::Active => (self.last_valid, false),
            ChargerState::Degraded => (self.last_valid, self.last_valid.is_some()),
        };
        self.snapshot = ChargerSnapshot {
            id: self.config.id.clone(),
            alias: self.config.alias().to_string(),
            state: self.state,
            binding: self.binding.state(),
            measurement,
            stale,
            cycle: self.cycle,
        };
        self.publisher.send_replace(self.snapshot.clone());
    }
}
