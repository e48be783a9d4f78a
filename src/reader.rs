use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use crate::binding::{BindingState, ParentDeviceBinding};
use crate::port::{StringAddress, StringSet};
use crate::traits::{ParentDevice, RegisterKind};

/// Raw values of one PV string for one cycle.
/// `None` marks a value that could not be read or was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StringReading {
    pub address: StringAddress,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

impl StringReading {
    pub fn unknown(address: StringAddress) -> Self {
        Self {
            address,
            voltage: None,
            current: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.voltage.is_some() && self.current.is_some()
    }
}

/// Reads voltage and current of every string, in address order.
///
/// Returns nothing unless the binding is `Bound`. A failed or panicking
/// register read only blanks that value.
pub fn read_strings(binding: &ParentDeviceBinding, addresses: StringSet) -> Vec<StringReading> {
    let parent = match (binding.state(), binding.handle()) {
        (BindingState::Bound, Some(parent)) => parent,
        _ => return Vec::new(),
    };

    addresses
        .to_vec()
        .into_iter()
        .map(|address| StringReading {
            address,
            voltage: read_value(parent.as_ref(), address.voltage, RegisterKind::Voltage),
            current: read_value(parent.as_ref(), address.current, RegisterKind::Current),
        })
        .collect()
}

fn read_value(parent: &dyn ParentDevice, register: u16, kind: RegisterKind) -> Option<f64> {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| parent.read_register(register, kind))) {
        Ok(result) => result,
        Err(_) => {
            warn!(parent = %parent.id(), register, ?kind, "Register read panicked");
            return None;
        }
    };
    match result {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        Ok(value) => {
            debug!(parent = %parent.id(), register, ?kind, value, "Discarding out-of-range value");
            None
        }
        Err(e) => {
            debug!(parent = %parent.id(), register, ?kind, "Register read failed: {:?}", e);
            None
        }
    }
}
