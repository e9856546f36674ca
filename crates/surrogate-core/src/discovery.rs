//! The UDP discovery responder (§4.E): answers `?edev` probes and
//! NTP-echo pings on the discovery-request port, and sends `!edev`
//! announcements either broadcast (one per eligible interface) or unicast
//! to a restricted host set.
//!
//! Per-datagram destination recovery (`IP_PKTINFO`) needs raw ancillary
//! message handling that safe `tokio`/`socket2` don't expose; this
//! responder answers every accepted probe with a plain unicast reply to
//! the sender instead of replicating the original per-interface matching
//! against the probe's own destination address. Documented as a deliberate
//! simplification rather than left silent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;

use mom_protocol::Status;

use crate::config_map;
use crate::controller::{Controller, DISCOVERY_REPLY_PORT};
use crate::error::SurrogateError;

const EDEV_PROBE: &[u8] = b"?edev\r";
const NTP_ECHO_PREFIX: &[u8] = b"\x0A\x00NTP Echo";
const RECV_BUF_SIZE: usize = 512;

pub fn bind(addr: Ipv4Addr, port: u16) -> Result<UdpSocket, SurrogateError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((addr, port)).into())?;
    UdpSocket::from_std(socket.into()).map_err(SurrogateError::from)
}

pub async fn run(controller: Controller, socket: UdpSocket) {
    let mut buf = [0u8; RECV_BUF_SIZE];
    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "discovery recv failed");
                continue;
            }
        };
        let SocketAddr::V4(src_v4) = src else {
            continue;
        };
        let payload = &buf[..n];

        if payload.starts_with(NTP_ECHO_PREFIX) {
            tracing::debug!(peer = %src_v4, "echoing NTP probe");
            if let Err(err) = socket.send_to(payload, src).await {
                tracing::warn!(error = %err, "NTP echo reply failed");
            }
            continue;
        }

        if payload.starts_with(EDEV_PROBE) {
            tracing::debug!(peer = %src_v4, "answering device enumeration probe");
            handle_probe(&controller, src_v4).await;
        }
    }
}

async fn handle_probe(controller: &Controller, src: SocketAddrV4) {
    if !crate::resolver::connection_is_allowed(controller, src.ip()).await {
        tracing::debug!(peer = %src, "probe rejected by host restriction");
        return;
    }
    let bytes = solicited_reply(controller);
    send_unicast(&bytes, SocketAddrV4::new(*src.ip(), DISCOVERY_REPLY_PORT)).await;
}

fn device_fields(controller: &Controller) -> (i32, String, String, String) {
    let options = controller.get_options();
    let options = options.borrow();
    (
        options.get_int(config_map::DEVICE_ID),
        options.get_str(config_map::DEVICE_NAME),
        options.get_str(config_map::MODEL_ID),
        options.get_str(config_map::SERIAL_NUMBER),
    )
}

fn solicited_reply(controller: &Controller) -> Vec<u8> {
    let (device_id, name, model, serial) = device_fields(controller);
    mom_protocol::serialize_enumerate_devices(true, device_id, &name, &model, &serial, Status::Success)
}

fn announcement(controller: &Controller) -> Vec<u8> {
    let (device_id, name, model, serial) = device_fields(controller);
    mom_protocol::serialize_enumerate_devices(false, device_id, &name, &model, &serial, Status::Success)
}

async fn send_unicast(bytes: &[u8], dest: SocketAddrV4) {
    match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
        Ok(socket) => {
            if let Err(err) = socket.send_to(bytes, dest).await {
                tracing::warn!(error = %err, dest = %dest, "discovery unicast send failed");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to open ephemeral discovery socket"),
    }
}

/// Send `!edev` to every resolved restriction target, or broadcast once per
/// eligible interface when there is no restriction.
pub async fn send_announcement(controller: &Controller, targets: Option<&[IpAddr]>) {
    let bytes = announcement(controller);
    match targets {
        Some(addrs) if !addrs.is_empty() => {
            for addr in addrs {
                if let IpAddr::V4(v4) = addr {
                    send_unicast(&bytes, SocketAddrV4::new(*v4, DISCOVERY_REPLY_PORT)).await;
                }
            }
        }
        Some(_) => {
            tracing::debug!("host restriction resolved to no addresses; announcement suppressed");
        }
        None => broadcast_per_interface(&bytes).await,
    }
}

async fn broadcast_per_interface(bytes: &[u8]) {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!(error = %err, "interface enumeration failed, skipping broadcast");
            return;
        }
    };

    for iface in interfaces {
        if iface.is_loopback() {
            continue;
        }
        let IpAddr::V4(bind_addr) = iface.ip() else {
            continue;
        };
        match bind_broadcast_socket(bind_addr).await {
            Ok(socket) => {
                let dest = SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_REPLY_PORT);
                if let Err(err) = socket.send_to(bytes, dest).await {
                    tracing::debug!(interface = %iface.name, error = %err, "broadcast send failed");
                }
            }
            Err(err) => tracing::debug!(interface = %iface.name, error = %err, "failed to bind broadcast socket"),
        }
    }
}

async fn bind_broadcast_socket(addr: Ipv4Addr) -> Result<UdpSocket, SurrogateError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((addr, 0)).into())?;
    UdpSocket::from_std(socket.into()).map_err(SurrogateError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_handler::NoopApplicationHandler;
    use crate::controller::Controller;

    #[test]
    fn edev_probe_is_recognized_by_its_first_six_bytes() {
        assert!(b"?edev\rextra bytes ignored".starts_with(EDEV_PROBE));
    }

    #[test]
    fn ntp_echo_is_recognized_by_its_ten_byte_prefix() {
        assert!(b"\x0A\x00NTP Echo extra".starts_with(NTP_ECHO_PREFIX));
    }

    #[test]
    fn solicited_reply_matches_documented_wire_order() {
        let controller = Controller::create(Default::default(), Box::new(NoopApplicationHandler));
        let bytes = solicited_reply(&controller);
        assert_eq!(bytes, b":edev,10,1,'MOM','710',0,'71000000000',0\r");
    }

    #[test]
    fn announcement_uses_notification_tag() {
        let controller = Controller::create(Default::default(), Box::new(NoopApplicationHandler));
        let bytes = announcement(&controller);
        assert_eq!(bytes[0], b'!');
    }
}
