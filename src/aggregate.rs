use serde::Serialize;

use crate::reader::StringReading;

/// Charger-level values of one cycle.
/// Power in W, voltage in V, current in A.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChargerMeasurement {
    pub power: f64,
    pub voltage: Option<f64>,
    pub current: f64,
    pub valid: bool,
}

impl ChargerMeasurement {
    /// Measurement carrying no usable data
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Combines the string readings of one port.
    ///
    /// Power and current only count strings where both values are known.
    /// With two strings the voltage is the higher of the known ones.
    /// At least one complete reading is required for a valid result,
    /// otherwise all values are reset.
    // NOTE: max-voltage for parallel strings still needs confirming against
    // GoodWe's own reporting for mismatched strings.
    pub fn from_readings(readings: &[StringReading]) -> Self {
        let complete: Vec<(f64, f64)> = readings
            .iter()
            .filter_map(|r| Some((r.voltage?, r.current?)))
            .collect();
        if complete.is_empty() {
            return Self::invalid();
        }

        let power: f64 = complete.iter().map(|(v, i)| v * i).sum();
        let current: f64 = readings.iter().filter_map(|r| r.current).sum();
        let voltage = readings
            .iter()
            .filter_map(|r| r.voltage)
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))));

        Self {
            power,
            voltage,
            current,
            valid: true,
        }
    }
}
