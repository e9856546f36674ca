//! The event dispatcher (§4.G): type/mask check, master gate, type match,
//! built-in handler, application fallback.

use mom_protocol::{self as proto, Event, EventCode, ParamList, Status};

use crate::app_handler::ReplySender;
use crate::controller::ControllerInner;
use crate::handlers::BuiltinHandler;
use crate::peer::PeerHandle;
use std::cell::RefCell;
use std::rc::Rc;

fn builtin_handler_for(code: EventCode) -> Option<BuiltinHandler> {
    use crate::handlers::*;
    use EventCode::*;
    match code {
        AliveRequest => Some(alive_request),
        GetDeviceID => Some(get_device_id),
        SetDeviceID => Some(set_device_id),
        GetHardwareConfig => Some(get_hardware_config),
        GetSoftwareVersion => Some(get_software_version),
        GetDeviceInfo => Some(get_device_info),
        GetMaster => Some(get_master),
        SetMaster => Some(set_master),
        GetAliveTime => Some(get_alive_time),
        SetAliveTime => Some(set_alive_time),
        GetIPAddress => Some(get_ip_address),
        SetIPAddress => Some(set_ip_address),
        GetKeyMode => Some(get_key_mode),
        SetKeyMode => Some(set_key_mode),
        _ => None,
    }
}

/// Process one already-parsed inbound message. Any reply this produces is
/// written directly into the peer's write buffer; the caller is
/// responsible for flushing afterward.
pub fn dispatch(peer: &PeerHandle, controller: &Rc<RefCell<ControllerInner>>, event: Event, mut params: ParamList) {
    let Some(name) = proto::event_name(event.code) else {
        return;
    };

    // Stage 1: type/mask check. Device-origin types never arrive inbound.
    if !event.event_type.is_host_any() {
        return;
    }
    if event.code as i32 > EventCode::MAX_WIRE {
        reply_or_drop(peer, event, name, Status::InvalidRequest, params);
        return;
    }

    // Stage 2: master gate. Any host request (get or set) is always allowed;
    // only notifications touching a master-only-floor code need an elected
    // master.
    let is_master = controller.borrow().registry.is_master(peer);
    let master_only = event.code.is_master_only_floor() && !event.event_type.is_host_request();
    if !is_master && master_only {
        reply_or_drop(peer, event, name, Status::RequiresMaster, params);
        return;
    }

    // Stage 3: type match.
    let Some(valid_types) = proto::valid_types_for(event.code) else {
        reply_or_drop(peer, event, name, Status::InvalidRequest, params);
        return;
    };
    if !event.event_type.intersects(valid_types) {
        reply_or_drop(peer, event, name, Status::InvalidRequest, params);
        return;
    }

    // Stage 4: built-in handler.
    let builtin_status = match builtin_handler_for(event.code) {
        Some(handler) => handler(peer, controller, &mut params),
        None => Status::Continue,
    };

    if builtin_status != Status::Continue && event.reply_type().is_some() {
        emit_reply(peer, event, name, builtin_status, params);
        return;
    }

    // Stage 5: application fallback. Get/set requests and notifications
    // alike get a `ReplySender` on the generic path — they all map to a
    // wire reply type via `reply_type()`.
    let reply = if event.reply_type().is_some() {
        Some(ReplySender {
            peer: Rc::clone(peer),
            request: event,
            event_name: name,
        })
    } else {
        None
    };

    let _ = controller.borrow_mut().app_handler.handle(peer, event, &mut params, reply);
}

fn reply_or_drop(peer: &PeerHandle, event: Event, name: &str, status: Status, params: ParamList) {
    if event.reply_type().is_some() {
        emit_reply(peer, event, name, status, params);
    }
}

/// Build and enqueue a DeviceReply/DeviceNotification for `request`,
/// prepending `status`. This is the single path both the built-in-handler
/// early exit and `ReplySender::send` go through.
pub fn emit_reply(peer: &PeerHandle, request: Event, name: &str, status: Status, params: ParamList) {
    if let Some(bytes) = proto::serialize_reply(request, name, status, params) {
        peer.borrow_mut().enqueue_write(&bytes);
    }
}

/// Handle a single raw wire line (without its CR), covering the codec's
/// "unknown tag dropped" / "unknown event name gets a stub reply" / "empty
/// line dropped" edge cases before handing a successfully parsed message to
/// `dispatch`.
pub fn handle_line(peer: &PeerHandle, controller: &Rc<RefCell<ControllerInner>>, line: &str) {
    match proto::parse_line(line) {
        Ok(message) => dispatch(peer, controller, message.event, message.params),
        Err(proto::ParseError::Empty) => {}
        Err(proto::ParseError::UnknownTag) => {}
        Err(proto::ParseError::UnknownEventName { error_reply: Some(bytes) }) => {
            peer.borrow_mut().enqueue_write(&bytes);
        }
        Err(proto::ParseError::UnknownEventName { error_reply: None }) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_handler::NoopApplicationHandler;
    use crate::controller::Controller;
    use crate::peer::Peer;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn setup() -> (Controller, PeerHandle) {
        let controller = Controller::create(Default::default(), Box::new(NoopApplicationHandler));
        let peer = Peer::new(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9999), Rc::downgrade(&controller.0));
        controller.0.borrow_mut().registry.insert(Rc::clone(&peer));
        (controller, peer)
    }

    fn drain(peer: &PeerHandle) -> Vec<u8> {
        let mut p = peer.borrow_mut();
        let bytes = p.pending_write().to_vec();
        let len = bytes.len();
        p.advance_written(len);
        bytes
    }

    #[test]
    fn alive_time_round_trip_scenario() {
        let (controller, peer) = setup();
        handle_line(&peer, &controller.0, "?galivetime");
        assert_eq!(drain(&peer), b":galivetime,0,20\r");

        handle_line(&peer, &controller.0, "&salivetime,5");
        assert_eq!(drain(&peer), b":salivetime,0,5\r");
        assert_eq!(controller.0.borrow().alive_time(), 5);
    }

    #[test]
    fn invalid_hardware_config_version_scenario() {
        let (controller, peer) = setup();
        handle_line(&peer, &controller.0, "?ghwconf,3");
        assert_eq!(drain(&peer), b":ghwconf,2,3\r");
    }

    #[test]
    fn non_master_key_mode_set_is_allowed() {
        let (controller, peer) = setup();
        handle_line(&peer, &controller.0, "&skeymode,1,1,0");
        assert_eq!(drain(&peer), b":skeymode,0,1,1,0\r");
    }

    #[test]
    fn master_then_notification_scenario() {
        let (controller, peer) = setup();
        handle_line(&peer, &controller.0, "%smaster,1");
        assert_eq!(drain(&peer), b"!smaster,0,1\r");
        assert!(controller.0.borrow().registry.is_master(&peer));
    }

    #[test]
    fn unknown_event_name_on_host_request_gets_stub_reply() {
        let (controller, peer) = setup();
        handle_line(&peer, &controller.0, "?nosuchevent");
        assert_eq!(drain(&peer), b"?nosuchevent,0\r");
    }
}
