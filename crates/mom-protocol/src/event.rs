/// A single event code, dense and ordered. The ordering matters: handlers
/// compare codes against `EventCode::GetKeyMode` to decide whether an event
/// is master-only (§4.G of the design doc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum EventCode {
    AliveRequest = 1,
    Identify,
    GetHardwareConfig,
    GetSoftwareVersion,
    GetDeviceInfo,
    GetMaster,
    SetMaster,
    GetAliveTime,
    SetAliveTime,
    GetDeviceID,
    SetDeviceID,
    GetIPAddress,
    SetIPAddress,
    GetKeyMode,
    SetKeyMode,
    GetKeyState,
    SetKeyState,
    GetLedState,
    SetLedState,
    GetLedIntensity,
    SetLedIntensity,
    GetRotationCount,
    SetRotationCount,
    GetRingLedState,
    SetRingLedState,
    EnumerateDevices,
    // API-internal only: never appear on the wire, never looked up by name.
    PortError,
    PortClosed,
    PortOpen,
    PortReady,
    PortConnected,
}

impl EventCode {
    pub const MAX_WIRE: i32 = EventCode::EnumerateDevices as i32;

    pub fn from_i32(value: i32) -> Option<Self> {
        use EventCode::*;
        let table = [
            AliveRequest,
            Identify,
            GetHardwareConfig,
            GetSoftwareVersion,
            GetDeviceInfo,
            GetMaster,
            SetMaster,
            GetAliveTime,
            SetAliveTime,
            GetDeviceID,
            SetDeviceID,
            GetIPAddress,
            SetIPAddress,
            GetKeyMode,
            SetKeyMode,
            GetKeyState,
            SetKeyState,
            GetLedState,
            SetLedState,
            GetLedIntensity,
            SetLedIntensity,
            GetRotationCount,
            SetRotationCount,
            GetRingLedState,
            SetRingLedState,
            EnumerateDevices,
            PortError,
            PortClosed,
            PortOpen,
            PortReady,
            PortConnected,
        ];
        table.into_iter().find(|c| *c as i32 == value)
    }

    /// True for event codes that require an elected master unless the
    /// request is a get-style host request.
    pub fn is_master_only_floor(self) -> bool {
        self as i32 >= EventCode::GetKeyMode as i32
    }
}

bitflags::bitflags! {
    /// Inbound/outbound type, packed into the upper bits of a wire `Event`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventType: u32 {
        const HOST_GET_REQUEST    = 0x0100_0000;
        const HOST_SET_REQUEST    = 0x0200_0000;
        const HOST_NOTIFICATION   = 0x0400_0000;
        const HOST_ANY            = 0x0F00_0000;
        const DEVICE_REPLY        = 0x1000_0000;
        const DEVICE_NOTIFICATION = 0x2000_0000;
        const DEVICE_ANY          = 0xF000_0000;
    }
}

impl EventType {
    pub fn is_host_request(self) -> bool {
        self.intersects(EventType::HOST_GET_REQUEST | EventType::HOST_SET_REQUEST)
    }

    pub fn is_host_any(self) -> bool {
        self.intersects(EventType::HOST_ANY)
    }
}

/// An event code and its type, kept as a plain struct rather than the
/// packed wire integer — the packed form exists only at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub code: EventCode,
    pub event_type: EventType,
}

impl Event {
    pub fn new(code: EventCode, event_type: EventType) -> Self {
        Self { code, event_type }
    }

    pub fn pack(self) -> i32 {
        (self.code as i32) | (self.event_type.bits() as i32)
    }

    pub fn unpack(value: i32) -> Option<Self> {
        let code_bits = value & 0x00FF_FFFF;
        let type_bits = (value as u32) & 0xFF00_0000;
        let code = EventCode::from_i32(code_bits)?;
        let event_type = EventType::from_bits(type_bits)?;
        Some(Event::new(code, event_type))
    }

    /// The reply type for a request of this event's type, per §4.A: get/set
    /// requests become device replies, notifications become device
    /// notifications.
    pub fn reply_type(self) -> Option<EventType> {
        if self
            .event_type
            .intersects(EventType::HOST_GET_REQUEST | EventType::HOST_SET_REQUEST)
        {
            Some(EventType::DEVICE_REPLY)
        } else if self.event_type.contains(EventType::HOST_NOTIFICATION) {
            Some(EventType::DEVICE_NOTIFICATION)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let event = Event::new(EventCode::GetAliveTime, EventType::HOST_GET_REQUEST);
        let packed = event.pack();
        assert_eq!(Event::unpack(packed), Some(event));
    }

    #[test]
    fn master_only_floor_matches_get_key_mode() {
        assert!(!EventCode::GetIPAddress.is_master_only_floor());
        assert!(EventCode::GetKeyMode.is_master_only_floor());
        assert!(EventCode::SetKeyMode.is_master_only_floor());
    }

    #[test]
    fn reply_type_maps_get_set_to_device_reply() {
        let get = Event::new(EventCode::GetAliveTime, EventType::HOST_GET_REQUEST);
        let set = Event::new(EventCode::SetAliveTime, EventType::HOST_SET_REQUEST);
        let notify = Event::new(EventCode::SetMaster, EventType::HOST_NOTIFICATION);
        assert_eq!(get.reply_type(), Some(EventType::DEVICE_REPLY));
        assert_eq!(set.reply_type(), Some(EventType::DEVICE_REPLY));
        assert_eq!(notify.reply_type(), Some(EventType::DEVICE_NOTIFICATION));
    }

    #[test]
    fn unpack_rejects_unknown_code() {
        assert_eq!(Event::unpack(0x0100_0000 | 9999), None);
    }
}
