use crate::event::{EventCode, EventType};

pub const MAX_EVENT_NAME_LEN: usize = 16;

struct EventRow {
    code: EventCode,
    name: &'static str,
    valid_types: EventType,
}

macro_rules! row {
    ($code:ident, $name:expr, $types:expr) => {
        EventRow {
            code: EventCode::$code,
            name: $name,
            valid_types: $types,
        }
    };
}

// Dense table, wire-name and valid inbound type(s) per event code. Codes
// with no wire name (the API-internal port-status events) are omitted;
// `EnumerateDevices` is listed for name lookup only — it is never dispatched
// through the host-request pipeline.
static EVENT_TABLE: &[EventRow] = &[
    row!(AliveRequest, "aliverequest", EventType::HOST_GET_REQUEST),
    row!(Identify, "sidentify", EventType::HOST_SET_REQUEST),
    row!(GetHardwareConfig, "ghwconf", EventType::HOST_GET_REQUEST),
    row!(GetSoftwareVersion, "gswver", EventType::HOST_GET_REQUEST),
    row!(GetDeviceInfo, "gdevinfo", EventType::HOST_GET_REQUEST),
    row!(GetMaster, "gmaster", EventType::HOST_GET_REQUEST),
    row!(SetMaster, "smaster", EventType::HOST_NOTIFICATION),
    row!(GetAliveTime, "galivetime", EventType::HOST_GET_REQUEST),
    row!(SetAliveTime, "salivetime", EventType::HOST_SET_REQUEST),
    row!(GetDeviceID, "gdevid", EventType::HOST_GET_REQUEST),
    row!(SetDeviceID, "sdevid", EventType::HOST_NOTIFICATION),
    row!(GetIPAddress, "gip", EventType::HOST_GET_REQUEST),
    row!(SetIPAddress, "sip", EventType::HOST_SET_REQUEST),
    row!(GetKeyMode, "gkeymode", EventType::HOST_GET_REQUEST),
    row!(SetKeyMode, "skeymode", EventType::HOST_SET_REQUEST),
    row!(GetKeyState, "gkeystate", EventType::HOST_GET_REQUEST),
    row!(SetKeyState, "skeystate", EventType::empty()),
    row!(GetLedState, "gledstate", EventType::HOST_GET_REQUEST),
    row!(SetLedState, "sledstate", EventType::HOST_NOTIFICATION),
    row!(GetLedIntensity, "gledint", EventType::HOST_GET_REQUEST),
    row!(SetLedIntensity, "sledint", EventType::HOST_NOTIFICATION),
    row!(GetRotationCount, "grotcount", EventType::HOST_GET_REQUEST),
    row!(SetRotationCount, "srotcount", EventType::HOST_NOTIFICATION),
    row!(GetRingLedState, "gringledstate", EventType::HOST_GET_REQUEST),
    row!(SetRingLedState, "sringledstate", EventType::HOST_NOTIFICATION),
    row!(
        EnumerateDevices,
        "edev",
        EventType::DEVICE_REPLY.union(EventType::DEVICE_NOTIFICATION)
    ),
];

pub fn event_name(code: EventCode) -> Option<&'static str> {
    EVENT_TABLE.iter().find(|r| r.code == code).map(|r| r.name)
}

pub fn lookup_event_code(name: &str) -> Option<EventCode> {
    if name.len() > MAX_EVENT_NAME_LEN {
        return None;
    }
    EVENT_TABLE.iter().find(|r| r.name == name).map(|r| r.code)
}

pub fn valid_types_for(code: EventCode) -> Option<EventType> {
    EVENT_TABLE.iter().find(|r| r.code == code).map(|r| r.valid_types)
}
