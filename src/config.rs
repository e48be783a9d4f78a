use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::port::MpptPort;

const DEFAULT_ID: &str = "charger0";
const DEFAULT_PARENT_ID: &str = "batteryInverter0";
const DEFAULT_PARENT_TARGET: &str = "(enabled=true)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("component id must not be empty")]
    EmptyId,
    #[error("component id '{0}' is already in use")]
    DuplicateId(String),
    #[error("unknown MPPT port '{0}'")]
    UnknownMpptPort(String),
    #[error("invalid charger configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable configuration of one charger.
///
/// Deserializing applies the same defaults and checks as
/// [`ChargerConfig::from_json_str`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawChargerConfig")]
pub struct ChargerConfig {
    pub id: String,
    /// Display name, empty means "same as id"
    pub alias: String,
    pub enabled: bool,
    pub mppt_port: MpptPort,
    #[serde(rename = "essOrBatteryInverter_id")]
    pub parent_device_id: String,
    /// Selection filter for the parent. Advisory only, never evaluated.
    #[serde(rename = "essOrBatteryInverter_target")]
    pub parent_device_target: String,
}

/// Wire form, the port stays textual so unknown values can be reported
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawChargerConfig {
    id: String,
    alias: String,
    enabled: bool,
    mppt_port: String,
    #[serde(rename = "essOrBatteryInverter_id")]
    parent_device_id: String,
    #[serde(rename = "essOrBatteryInverter_target")]
    parent_device_target: String,
}

impl Default for RawChargerConfig {
    fn default() -> Self {
        let config = ChargerConfig::default();
        Self {
            id: config.id,
            alias: config.alias,
            enabled: config.enabled,
            mppt_port: config.mppt_port.name().to_string(),
            parent_device_id: config.parent_device_id,
            parent_device_target: config.parent_device_target,
        }
    }
}

impl TryFrom<RawChargerConfig> for ChargerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawChargerConfig) -> Result<Self, Self::Error> {
        let mppt_port =
            MpptPort::from_name(&raw.mppt_port).ok_or(ConfigError::UnknownMpptPort(raw.mppt_port))?;
        let config = Self {
            id: raw.id,
            alias: raw.alias,
            enabled: raw.enabled,
            mppt_port,
            parent_device_id: raw.parent_device_id,
            parent_device_target: raw.parent_device_target,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID.to_string(),
            alias: String::new(),
            enabled: true,
            mppt_port: MpptPort::default(),
            parent_device_id: DEFAULT_PARENT_ID.to_string(),
            parent_device_target: DEFAULT_PARENT_TARGET.to_string(),
        }
    }
}

impl ChargerConfig {
    pub fn new(id: impl Into<String>, mppt_port: MpptPort, parent_device_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mppt_port,
            parent_device_id: parent_device_id.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parses and validates a JSON configuration; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawChargerConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        Ok(())
    }

    /// Alias, falling back to the id
    pub fn alias(&self) -> &str {
        if self.alias.is_empty() { &self.id } else { &self.alias }
    }
}

/// Component ids in use within one host
#[derive(Debug, Default)]
pub struct ComponentIds {
    ids: HashSet<String>,
}

impl ComponentIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, config: &ChargerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if !self.ids.insert(config.id.clone()) {
            return Err(ConfigError::DuplicateId(config.id.clone()));
        }
        Ok(())
    }

    pub fn release(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChargerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ChargerConfig::default());
        assert_eq!(config.id, "charger0");
        assert_eq!(config.alias(), "charger0");
        assert!(config.enabled);
        assert_eq!(config.mppt_port, MpptPort::Mppt1);
        assert_eq!(config.parent_device_id, "batteryInverter0");
        assert_eq!(config.parent_device_target, "(enabled=true)");
    }

    #[test]
    fn full_config() {
        let config = ChargerConfig::from_json_str(
            r#"{
                "id": "charger1",
                "alias": "Garage roof",
                "enabled": false,
                "mpptPort": "MPPT_2",
                "essOrBatteryInverter_id": "ess0",
                "essOrBatteryInverter_target": "(&(enabled=true)(id=ess0))"
            }"#,
        )
        .unwrap();
        assert_eq!(config.id, "charger1");
        assert_eq!(config.alias(), "Garage roof");
        assert!(!config.enabled);
        assert_eq!(config.mppt_port, MpptPort::Mppt2);
        assert_eq!(config.parent_device_id, "ess0");
    }

    #[test]
    fn unknown_port_is_rejected() {
        let err = ChargerConfig::from_json_str(r#"{"mpptPort": "MPPT_7"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMpptPort(ref p) if p == "MPPT_7"));
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = ChargerConfig::from_json_str(r#"{"id": "  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyId));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ChargerConfig::from_json_str(r#"{"enabled": "yes"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut ids = ComponentIds::new();
        ids.claim(&ChargerConfig::new("charger0", MpptPort::Mppt1, "ess0")).unwrap();
        ids.claim(&ChargerConfig::new("charger1", MpptPort::Mppt2, "ess0")).unwrap();

        let err = ids
            .claim(&ChargerConfig::new("charger0", MpptPort::Mppt3, "ess0"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateId(ref id) if id == "charger0"));

        assert!(ids.release("charger0"));
        assert!(!ids.contains("charger0"));
        ids.claim(&ChargerConfig::new("charger0", MpptPort::Mppt3, "ess0")).unwrap();
    }

    #[test]
    fn deserialize_applies_checks() {
        let config: ChargerConfig =
            serde_json::from_str(r#"{"id": "charger3", "mpptPort": "MPPT_3"}"#).unwrap();
        assert_eq!(config.mppt_port, MpptPort::Mppt3);
        assert_eq!(config.parent_device_id, "batteryInverter0");

        let err = serde_json::from_str::<ChargerConfig>(r#"{"mpptPort": "MPPT_7"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown MPPT port 'MPPT_7'"));
        assert!(serde_json::from_str::<ChargerConfig>(r#"{"id": ""}"#).is_err());

        let json = serde_json::to_string(&ChargerConfig::default()).unwrap();
        assert_eq!(serde_json::from_str::<ChargerConfig>(&json).unwrap(), ChargerConfig::default());
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(ChargerConfig::default()).unwrap();
        assert_eq!(json["mpptPort"], "MPPT_1");
        assert_eq!(json["essOrBatteryInverter_id"], "batteryInverter0");
    }
}
