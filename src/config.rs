//! Process-level configuration loading (§4.J): a TOML file, validated into
//! `SurrogateConfig`, independent of the in-engine configuration mapping
//! (`surrogate_core::ConfigMap`) the controller seeds from it and mutates
//! live thereafter.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

use serde::Deserialize;

use surrogate_core::ConfigValue;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/surrogate/surrogate.toml";

#[derive(Debug, Deserialize, Default)]
struct RawSurrogateConfig {
    schema_version: Option<u32>,
    device: Option<RawDeviceConfig>,
    network: Option<RawNetworkConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDeviceConfig {
    device_id: Option<i32>,
    device_name: Option<String>,
    model_id: Option<String>,
    serial_number: Option<String>,
    system_type_and_version: Option<String>,
    cpu_firmware_tag: Option<String>,
    cpu_firmware_version: Option<String>,
    recovery_firmware_tag: Option<String>,
    recovery_firmware_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawNetworkConfig {
    restrict_to_specified_host: Option<String>,
    local_interface_address: Option<String>,
    alive_time: Option<u32>,
}

/// A validated, fully-defaulted process configuration (§4.J). Distinct from
/// `surrogate_core::ConfigMap`: this is how an operator configures the
/// process; that is the live, protocol-mutable state the engine runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct SurrogateConfig {
    pub device_id: i32,
    pub device_name: String,
    pub model_id: String,
    pub serial_number: String,
    pub system_type_and_version: String,
    pub cpu_firmware_tag: String,
    pub cpu_firmware_version: String,
    pub recovery_firmware_tag: String,
    pub recovery_firmware_version: String,
    pub restrict_to_specified_host: Option<String>,
    pub local_interface_address: Option<Ipv4Addr>,
    pub alive_time: u32,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        SurrogateConfig {
            device_id: 10,
            device_name: "MOM".to_owned(),
            model_id: "710".to_owned(),
            serial_number: "71000000000".to_owned(),
            system_type_and_version: "710100A   171127".to_owned(),
            cpu_firmware_tag: "cpufw".to_owned(),
            cpu_firmware_version: "1.0.0.2".to_owned(),
            recovery_firmware_tag: "recovery".to_owned(),
            recovery_firmware_version: "1.0.0.2".to_owned(),
            restrict_to_specified_host: None,
            local_interface_address: None,
            alive_time: surrogate_core::DEFAULT_ALIVE_TIME_SECS,
        }
    }
}

impl SurrogateConfig {
    /// Seed a controller's runtime options mapping (§3) from this
    /// process-level config. `alive_time` is not part of the mapping; the
    /// caller installs it separately via `ControllerInner::set_alive_time`.
    pub fn to_overrides(&self) -> HashMap<String, ConfigValue> {
        let mut overrides = HashMap::new();
        overrides.insert(surrogate_core::config_map::DEVICE_ID.to_owned(), ConfigValue::Int(self.device_id));
        overrides.insert(
            surrogate_core::config_map::DEVICE_NAME.to_owned(),
            ConfigValue::Str(self.device_name.clone()),
        );
        overrides.insert(surrogate_core::config_map::MODEL_ID.to_owned(), ConfigValue::Str(self.model_id.clone()));
        overrides.insert(
            surrogate_core::config_map::SERIAL_NUMBER.to_owned(),
            ConfigValue::Str(self.serial_number.clone()),
        );
        overrides.insert(
            surrogate_core::config_map::SYSTEM_TYPE_AND_VERSION.to_owned(),
            ConfigValue::Str(self.system_type_and_version.clone()),
        );
        overrides.insert(
            surrogate_core::config_map::CPU_FIRMWARE_TAG.to_owned(),
            ConfigValue::Str(self.cpu_firmware_tag.clone()),
        );
        overrides.insert(
            surrogate_core::config_map::CPU_FIRMWARE_VERSION.to_owned(),
            ConfigValue::Str(self.cpu_firmware_version.clone()),
        );
        overrides.insert(
            surrogate_core::config_map::RECOVERY_FIRMWARE_TAG.to_owned(),
            ConfigValue::Str(self.recovery_firmware_tag.clone()),
        );
        overrides.insert(
            surrogate_core::config_map::RECOVERY_FIRMWARE_VERSION.to_owned(),
            ConfigValue::Str(self.recovery_firmware_version.clone()),
        );
        if let Some(host) = &self.restrict_to_specified_host {
            overrides.insert(
                surrogate_core::config_map::RESTRICT_TO_SPECIFIED_HOST.to_owned(),
                ConfigValue::Str(host.clone()),
            );
        }
        if let Some(addr) = self.local_interface_address {
            overrides.insert(
                surrogate_core::config_map::LOCAL_INTERFACE_ADDRESS.to_owned(),
                ConfigValue::SockAddr(SocketAddrV4::new(addr, 0)),
            );
        }
        overrides
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    MissingField(&'static str),
    InvalidValue { field: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
            ConfigError::MissingField(field) => write!(f, "missing required field `{field}`"),
            ConfigError::InvalidValue { field, value } => write!(f, "invalid value for `{field}`: {value}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse(value)
    }
}

pub fn load(path: &Path) -> Result<SurrogateConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

fn parse(text: &str) -> Result<SurrogateConfig, ConfigError> {
    let raw: RawSurrogateConfig = toml::from_str(text)?;
    validate(raw)
}

fn validate(raw: RawSurrogateConfig) -> Result<SurrogateConfig, ConfigError> {
    let schema_version = raw.schema_version.ok_or(ConfigError::MissingField("schema_version"))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue {
            field: "schema_version",
            value: schema_version.to_string(),
        });
    }

    let defaults = SurrogateConfig::default();
    let device = raw.device.unwrap_or_default();
    let network = raw.network.unwrap_or_default();

    let local_interface_address = match network.local_interface_address {
        Some(s) => Some(s.parse::<Ipv4Addr>().map_err(|_| ConfigError::InvalidValue {
            field: "local_interface_address",
            value: s,
        })?),
        None => None,
    };

    let alive_time = network.alive_time.unwrap_or(defaults.alive_time);
    if !(1..=60).contains(&alive_time) {
        return Err(ConfigError::InvalidValue {
            field: "alive_time",
            value: alive_time.to_string(),
        });
    }

    Ok(SurrogateConfig {
        device_id: device.device_id.unwrap_or(defaults.device_id),
        device_name: device.device_name.unwrap_or(defaults.device_name),
        model_id: device.model_id.unwrap_or(defaults.model_id),
        serial_number: device.serial_number.unwrap_or(defaults.serial_number),
        system_type_and_version: device.system_type_and_version.unwrap_or(defaults.system_type_and_version),
        cpu_firmware_tag: device.cpu_firmware_tag.unwrap_or(defaults.cpu_firmware_tag),
        cpu_firmware_version: device.cpu_firmware_version.unwrap_or(defaults.cpu_firmware_version),
        recovery_firmware_tag: device.recovery_firmware_tag.unwrap_or(defaults.recovery_firmware_tag),
        recovery_firmware_version: device.recovery_firmware_version.unwrap_or(defaults.recovery_firmware_version),
        restrict_to_specified_host: network.restrict_to_specified_host,
        local_interface_address,
        alive_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_fills_in_every_default() {
        let config = parse("schema_version = 1\n").unwrap();
        assert_eq!(config, SurrogateConfig::default());
    }

    #[test]
    fn missing_schema_version_is_rejected() {
        assert!(matches!(parse(""), Err(ConfigError::MissingField("schema_version"))));
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let err = parse("schema_version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "schema_version", .. }));
    }

    #[test]
    fn device_and_network_sections_override_defaults() {
        let text = r#"
            schema_version = 1

            [device]
            device_id = 42
            device_name = "Bench Unit"

            [network]
            restrict_to_specified_host = "192.0.2.10"
            local_interface_address = "192.0.2.1"
            alive_time = 30
        "#;
        let config = parse(text).unwrap();
        assert_eq!(config.device_id, 42);
        assert_eq!(config.device_name, "Bench Unit");
        assert_eq!(config.restrict_to_specified_host.as_deref(), Some("192.0.2.10"));
        assert_eq!(config.local_interface_address, Some(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(config.alive_time, 30);
    }

    #[test]
    fn out_of_range_alive_time_is_rejected() {
        let text = "schema_version = 1\n\n[network]\nalive_time = 61\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "alive_time", .. }));
    }

    #[test]
    fn unparseable_local_interface_address_is_rejected() {
        let text = "schema_version = 1\n\n[network]\nlocal_interface_address = \"not-an-ip\"\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "local_interface_address", .. }));
    }

    #[test]
    fn overrides_carry_device_fields_into_the_options_map() {
        let mut config = SurrogateConfig::default();
        config.device_id = 99;
        let overrides = config.to_overrides();
        assert_eq!(
            overrides.get(surrogate_core::config_map::DEVICE_ID),
            Some(&ConfigValue::Int(99))
        );
        assert!(!overrides.contains_key(surrogate_core::config_map::RESTRICT_TO_SPECIFIED_HOST));
    }
}
