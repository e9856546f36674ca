use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::rc::Rc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use mom_protocol::{ParamList, Status};

use crate::app_handler::ApplicationHandler;
use crate::config_map::{self, ConfigMap, ConfigMapHandle, ConfigValue};
use crate::error::SurrogateError;
use crate::registry::PeerRegistry;

pub const DEFAULT_ALIVE_TIME_SECS: u32 = 20;
pub const DISCOVERY_REQUEST_PORT: u16 = 10002;
pub const CONTROL_PORT: u16 = 10003;
pub const DISCOVERY_REPLY_PORT: u16 = 10004;

/// Handles for the two listening sockets' background tasks, held so
/// `EndDiscoverability` can tear them down and so `BeginDiscoverability`
/// can refuse to run twice.
struct DiscoverabilityHandles {
    tcp_task: JoinHandle<()>,
    udp_task: JoinHandle<()>,
    expiry_task: JoinHandle<()>,
}

impl Drop for DiscoverabilityHandles {
    fn drop(&mut self) {
        self.tcp_task.abort();
        self.udp_task.abort();
        self.expiry_task.abort();
    }
}

pub struct ControllerInner {
    pub options: ConfigMapHandle,
    pub registry: PeerRegistry,
    pub app_handler: Box<dyn ApplicationHandler>,
    alive_time: u32,
    alive_time_tx: watch::Sender<u32>,
    discoverability: Option<DiscoverabilityHandles>,
}

impl ControllerInner {
    pub fn alive_time(&self) -> u32 {
        self.alive_time
    }

    /// No-op if the value is unchanged; otherwise reinstalls the expiry
    /// timer's period by notifying the background sweep task (§4.G/§4.H).
    pub fn set_alive_time(&mut self, seconds: u32) -> bool {
        if seconds == self.alive_time {
            return false;
        }
        self.alive_time = seconds;
        let _ = self.alive_time_tx.send(seconds);
        true
    }

    pub fn is_master(&self, peer: &crate::peer::PeerHandle) -> bool {
        self.registry.is_master(peer)
    }
}

/// The engine (§4.H). Cheap to clone — it's a handle onto shared state, not
/// an owned copy; every clone observes the same controller.
#[derive(Clone)]
pub struct Controller(pub Rc<RefCell<ControllerInner>>);

impl Controller {
    pub fn create(overrides: HashMap<String, ConfigValue>, app_handler: Box<dyn ApplicationHandler>) -> Self {
        let options = config_map::new_handle(ConfigMap::with_defaults(overrides));
        let (alive_time_tx, _) = watch::channel(DEFAULT_ALIVE_TIME_SECS);
        let inner = ControllerInner {
            options,
            registry: PeerRegistry::new(),
            app_handler,
            alive_time: DEFAULT_ALIVE_TIME_SECS,
            alive_time_tx,
            discoverability: None,
        };
        Controller(Rc::new(RefCell::new(inner)))
    }

    pub fn get_options(&self) -> ConfigMapHandle {
        self.0.borrow().options.clone()
    }

    fn local_interface_address(&self) -> Option<SocketAddrV4> {
        self.0
            .borrow()
            .options
            .borrow()
            .get(config_map::LOCAL_INTERFACE_ADDRESS)
            .and_then(ConfigValue::as_sock_addr)
    }

    fn restrict_to_specified_host(&self) -> Option<String> {
        self.0
            .borrow()
            .options
            .borrow()
            .get(config_map::RESTRICT_TO_SPECIFIED_HOST)
            .and_then(ConfigValue::as_str)
            .map(str::to_owned)
    }

    /// Creates both sockets, schedules their accept/recv loops, and emits
    /// one broadcast announcement. Refuses (`AlreadyDiscoverable`) if
    /// already running. Rolls back the TCP listener if UDP setup fails.
    pub async fn begin_discoverability(&self) -> Result<(), SurrogateError> {
        if self.0.borrow().discoverability.is_some() {
            return Err(SurrogateError::AlreadyDiscoverable);
        }

        let bind_addr = self
            .local_interface_address()
            .map(|a| *a.ip())
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);

        let tcp_listener = crate::acceptor::bind(bind_addr, CONTROL_PORT).await?;
        let udp_socket = match crate::discovery::bind(bind_addr, DISCOVERY_REQUEST_PORT) {
            Ok(socket) => socket,
            Err(err) => {
                drop(tcp_listener);
                return Err(err);
            }
        };

        let controller = self.clone();
        let tcp_task = tokio::task::spawn_local(crate::acceptor::run(controller, tcp_listener));

        let controller = self.clone();
        let udp_task = tokio::task::spawn_local(crate::discovery::run(controller, udp_socket));

        let controller = self.clone();
        let mut alive_time_rx = self.0.borrow().alive_time_tx.subscribe();
        let expiry_task = tokio::task::spawn_local(async move {
            loop {
                let period = *alive_time_rx.borrow_and_update();
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(period as u64)) => {
                        controller.sweep_expired().await;
                    }
                    _ = alive_time_rx.changed() => {
                        // Period changed; loop back around to resleep for the new duration.
                    }
                }
            }
        });

        self.0.borrow_mut().discoverability = Some(DiscoverabilityHandles {
            tcp_task,
            udp_task,
            expiry_task,
        });

        self.announce_discoverability().await;
        Ok(())
    }

    pub fn end_discoverability(&self) {
        let mut inner = self.0.borrow_mut();
        inner.discoverability = None;
        inner.registry.clear_master(false);
        for peer in inner.registry.invalidate_all() {
            peer.borrow_mut().close();
        }
    }

    async fn sweep_expired(&self) {
        let alive_time = self.0.borrow().alive_time();
        let expired = self
            .0
            .borrow_mut()
            .registry
            .sweep_expired(alive_time, tokio::time::Instant::now());
        for peer in expired {
            peer.borrow_mut().close();
        }
    }

    pub async fn announce_discoverability(&self) {
        let restrict_host = self.restrict_to_specified_host();
        let targets = crate::resolver::resolve_restriction(restrict_host.as_deref()).await;
        crate::discovery::send_announcement(self, targets.as_deref()).await;
    }

    /// Enqueues `event` as a DeviceNotification to every peer and flushes
    /// immediately. Fails with `SocketError` if there are no peers.
    pub async fn notify(&self, event_name: &str, params: ParamList) -> Status {
        let status = self.notify_deferred(event_name, params);
        if status == Status::SocketError {
            return status;
        }
        self.send_deferred().await;
        status
    }

    pub fn notify_deferred(&self, event_name: &str, params: ParamList) -> Status {
        let inner = self.0.borrow();
        if inner.registry.is_empty() {
            return Status::SocketError;
        }
        let line = mom_protocol::serialize_notification(event_name, &params);
        for peer in inner.registry.iter() {
            peer.borrow_mut().enqueue_write(&line);
        }
        Status::Success
    }

    pub fn register_peer(&self, peer: &crate::peer::PeerHandle) {
        self.0.borrow_mut().registry.insert(Rc::clone(peer));
    }

    pub fn disconnect_peer(&self, peer: &crate::peer::PeerHandle) {
        self.0.borrow_mut().registry.remove(peer);
        peer.borrow_mut().close();
    }

    pub async fn send_deferred(&self) {
        let peers: Vec<_> = self.0.borrow().registry.iter().cloned().collect();
        for peer in peers {
            crate::acceptor::flush_peer(&peer).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_handler::NoopApplicationHandler;

    #[test]
    fn create_installs_default_alive_time() {
        let controller = Controller::create(HashMap::new(), Box::new(NoopApplicationHandler));
        assert_eq!(controller.0.borrow().alive_time(), DEFAULT_ALIVE_TIME_SECS);
    }

    #[test]
    fn set_alive_time_is_a_noop_when_unchanged() {
        let controller = Controller::create(HashMap::new(), Box::new(NoopApplicationHandler));
        assert!(!controller.0.borrow_mut().set_alive_time(DEFAULT_ALIVE_TIME_SECS));
        assert!(controller.0.borrow_mut().set_alive_time(5));
    }
}
