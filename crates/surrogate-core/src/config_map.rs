use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::rc::Rc;

/// A value held in the runtime configuration mapping (§3). This is
/// distinct from the file-level `SurrogateConfig` the binary loads at
/// startup — this mapping is the live, protocol-mutable state that getters
/// and setters like `GetDeviceID`/`SetDeviceID` act on.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i32),
    SockAddr(SocketAddrV4),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_sock_addr(&self) -> Option<SocketAddrV4> {
        match self {
            ConfigValue::SockAddr(a) => Some(*a),
            _ => None,
        }
    }
}

pub const DEVICE_ID: &str = "device_id";
pub const DEVICE_NAME: &str = "device_name";
pub const MODEL_ID: &str = "model_id";
pub const SERIAL_NUMBER: &str = "serial_number";
pub const SYSTEM_TYPE_AND_VERSION: &str = "system_type_and_version";
pub const CPU_FIRMWARE_TAG: &str = "cpu_firmware_tag";
pub const CPU_FIRMWARE_VERSION: &str = "cpu_firmware_version";
pub const RECOVERY_FIRMWARE_TAG: &str = "recovery_firmware_tag";
pub const RECOVERY_FIRMWARE_VERSION: &str = "recovery_firmware_version";
pub const RESTRICT_TO_SPECIFIED_HOST: &str = "restrict_to_specified_host";
pub const LOCAL_INTERFACE_ADDRESS: &str = "local_interface_address";

/// The mutable options mapping. Shared, never cloned out as an owned copy —
/// `Controller::get_options` hands out a handle onto the same `RefCell`
/// (§4.H: "returns the mutable configuration mapping, not a copy").
pub type ConfigMapHandle = Rc<RefCell<ConfigMap>>;

#[derive(Debug, Default)]
pub struct ConfigMap {
    values: HashMap<String, ConfigValue>,
}

impl ConfigMap {
    /// Build a mapping with every documented default populated, in the
    /// order the original controller installs them. `restrict_to_specified_host`
    /// has no default: if the caller passed an empty or otherwise invalid
    /// value, it is removed rather than defaulted.
    pub fn with_defaults(overrides: HashMap<String, ConfigValue>) -> Self {
        let mut map = ConfigMap::default();
        map.set_default(DEVICE_ID, ConfigValue::Int(10), &overrides);
        map.set_default(DEVICE_NAME, ConfigValue::Str("MOM".to_owned()), &overrides);
        map.set_default(MODEL_ID, ConfigValue::Str("710".to_owned()), &overrides);
        map.set_default(
            SERIAL_NUMBER,
            ConfigValue::Str("71000000000".to_owned()),
            &overrides,
        );
        map.set_default(
            SYSTEM_TYPE_AND_VERSION,
            ConfigValue::Str("710100A   171127".to_owned()),
            &overrides,
        );
        map.set_default(
            CPU_FIRMWARE_TAG,
            ConfigValue::Str("cpufw".to_owned()),
            &overrides,
        );
        map.set_default(
            CPU_FIRMWARE_VERSION,
            ConfigValue::Str("1.0.0.2".to_owned()),
            &overrides,
        );
        map.set_default(
            RECOVERY_FIRMWARE_TAG,
            ConfigValue::Str("recovery".to_owned()),
            &overrides,
        );
        map.set_default(
            RECOVERY_FIRMWARE_VERSION,
            ConfigValue::Str("1.0.0.2".to_owned()),
            &overrides,
        );

        if let Some(ConfigValue::SockAddr(addr)) = overrides.get(LOCAL_INTERFACE_ADDRESS) {
            map.values
                .insert(LOCAL_INTERFACE_ADDRESS.to_owned(), ConfigValue::SockAddr(*addr));
        }

        match overrides.get(RESTRICT_TO_SPECIFIED_HOST) {
            Some(ConfigValue::Str(s)) if !s.is_empty() => {
                map.values
                    .insert(RESTRICT_TO_SPECIFIED_HOST.to_owned(), ConfigValue::Str(s.clone()));
            }
            _ => {
                // No default for this key; an empty/invalid override is
                // simply absent rather than defaulted.
            }
        }

        map
    }

    fn set_default(&mut self, key: &str, default: ConfigValue, overrides: &HashMap<String, ConfigValue>) {
        let value = overrides.get(key).cloned().unwrap_or(default);
        self.values.insert(key.to_owned(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get_str(&self, key: &str) -> String {
        self.get(key).and_then(ConfigValue::as_str).unwrap_or("").to_owned()
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.get(key).and_then(ConfigValue::as_int).unwrap_or(0)
    }
}

pub fn new_handle(map: ConfigMap) -> ConfigMapHandle {
    Rc::new(RefCell::new(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated_when_no_overrides_given() {
        let map = ConfigMap::with_defaults(HashMap::new());
        assert_eq!(map.get_int(DEVICE_ID), 10);
        assert_eq!(map.get_str(DEVICE_NAME), "MOM");
        assert_eq!(map.get_str(MODEL_ID), "710");
        assert_eq!(map.get_str(SERIAL_NUMBER), "71000000000");
        assert!(map.get(RESTRICT_TO_SPECIFIED_HOST).is_none());
    }

    #[test]
    fn empty_restrict_host_override_is_dropped_not_defaulted() {
        let mut overrides = HashMap::new();
        overrides.insert(RESTRICT_TO_SPECIFIED_HOST.to_owned(), ConfigValue::Str(String::new()));
        let map = ConfigMap::with_defaults(overrides);
        assert!(map.get(RESTRICT_TO_SPECIFIED_HOST).is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert(DEVICE_NAME.to_owned(), ConfigValue::Str("Custom".to_owned()));
        let map = ConfigMap::with_defaults(overrides);
        assert_eq!(map.get_str(DEVICE_NAME), "Custom");
    }
}
