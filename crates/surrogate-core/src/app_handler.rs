use mom_protocol::{Event, ParamList, Status};

use crate::peer::PeerHandle;

/// Callback a built-in handler or the dispatcher hands to the application
/// handler for a host request; it is expected to be invoked exactly once,
/// synchronously or after deferring the work, per §4.I.
pub struct ReplySender {
    pub(crate) peer: PeerHandle,
    pub(crate) request: Event,
    pub(crate) event_name: &'static str,
}

impl ReplySender {
    pub fn send(self, status: Status, params: ParamList) {
        crate::dispatcher::emit_reply(&self.peer, self.request, self.event_name, status, params);
    }
}

/// The out-of-scope embedder collaborator (§4.I / §1): device-specific
/// semantics (LEDs, keys, rotary state) live behind this trait. Everything
/// else in this crate treats it as an opaque callback.
pub trait ApplicationHandler {
    fn handle(
        &mut self,
        peer: &PeerHandle,
        event: Event,
        params: &mut ParamList,
        reply: Option<ReplySender>,
    ) -> Status;
}

/// Reference handler shipped with the binary: logs and politely declines
/// anything it doesn't recognize. Real device semantics are out of scope.
#[derive(Default)]
pub struct NoopApplicationHandler;

impl ApplicationHandler for NoopApplicationHandler {
    fn handle(
        &mut self,
        peer: &PeerHandle,
        event: Event,
        params: &mut ParamList,
        reply: Option<ReplySender>,
    ) -> Status {
        tracing::debug!(
            peer = %peer.borrow().name,
            code = ?event.code,
            param_count = params.len(),
            "application handler received unimplemented event"
        );
        match reply {
            Some(sender) => {
                sender.send(Status::InvalidRequest, params.clone());
                Status::Continue
            }
            None => Status::InvalidRequest,
        }
    }
}
