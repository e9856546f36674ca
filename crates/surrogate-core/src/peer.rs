use std::cell::RefCell;
use std::net::SocketAddrV4;
use std::rc::{Rc, Weak};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::Instant;

use crate::controller::ControllerInner;

/// Ordered port-status lattice (§3). Monotonic in the usual direction but
/// may drop to `Closed` from any state on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortStatus {
    Closed = -1,
    Open = 0,
    Ready = 1,
    Connected = 2,
}

pub type PeerHandle = Rc<RefCell<Peer>>;

/// One connected TCP controller (§3/§4.C). Holds only state; the owning
/// task (see `acceptor::run_peer_session`) performs the actual socket I/O
/// and calls back into this struct to update buffers and timestamps.
pub struct Peer {
    pub address: SocketAddrV4,
    pub name: String,
    pub controller: Weak<RefCell<ControllerInner>>,
    read_accumulator: String,
    write_buffer: Vec<u8>,
    bytes_written: usize,
    pub port_status: PortStatus,
    /// `None` is the forced-expire sentinel (the original's `last_activity = 0`):
    /// the next sweep removes this peer unconditionally.
    pub last_activity: Option<Instant>,
    /// Taken out by `acceptor::flush_peer` for the duration of an actual
    /// socket write, so the `RefCell` borrow doesn't span an await point.
    socket_write: Option<OwnedWriteHalf>,
}

impl Peer {
    pub fn new(address: SocketAddrV4, controller: Weak<RefCell<ControllerInner>>) -> PeerHandle {
        Rc::new(RefCell::new(Peer {
            address,
            name: address.to_string(),
            controller,
            read_accumulator: String::new(),
            write_buffer: Vec::new(),
            bytes_written: 0,
            port_status: PortStatus::Closed,
            last_activity: None,
            socket_write: None,
        }))
    }

    pub fn attach_write_half(&mut self, half: OwnedWriteHalf) {
        self.socket_write = Some(half);
    }

    pub fn take_write_half(&mut self) -> Option<OwnedWriteHalf> {
        self.socket_write.take()
    }

    pub fn restore_write_half(&mut self, half: OwnedWriteHalf) {
        self.socket_write = Some(half);
    }

    /// Append freshly-read bytes and stamp `last_activity`, even if the
    /// chunk turned out to be empty or failed UTF-8 decoding (in which
    /// case it's silently dropped for this read, per §4.C).
    pub fn on_read(&mut self, chunk: &[u8], now: Instant) {
        self.last_activity = Some(now);
        if let Ok(text) = std::str::from_utf8(chunk) {
            self.read_accumulator.push_str(text);
        }
    }

    /// Split the accumulator into complete CR-terminated messages if (and
    /// only if) it currently ends with a bare CR; otherwise returns `None`
    /// and leaves the partial data buffered. On a split, the whole
    /// accumulator is cleared, matching the reference framing behavior.
    pub fn take_complete_messages(&mut self) -> Option<Vec<String>> {
        if !self.read_accumulator.ends_with('\r') {
            return None;
        }
        let lines: Vec<String> = self
            .read_accumulator
            .split('\r')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        self.read_accumulator.clear();
        Some(lines)
    }

    pub fn enqueue_write(&mut self, bytes: &[u8]) {
        self.write_buffer.extend_from_slice(bytes);
    }

    /// Bytes still pending a flush, starting at the cursor.
    pub fn pending_write(&self) -> &[u8] {
        &self.write_buffer[self.bytes_written..]
    }

    /// Record that `n` more bytes were accepted by the stream. Resets the
    /// buffer once fully flushed (§3 invariant: `bytes_written <= len`,
    /// reset to empty when equal).
    pub fn advance_written(&mut self, n: usize) {
        self.bytes_written += n;
        if self.bytes_written >= self.write_buffer.len() {
            self.write_buffer.clear();
            self.bytes_written = 0;
        }
    }

    pub fn has_pending_write(&self) -> bool {
        self.bytes_written < self.write_buffer.len()
    }

    /// Transition to `Closed` if currently at or above `Open`, and force
    /// expiry on the next sweep. Master election, if held by this peer, is
    /// cleared separately by the registry (it needs a handle to compare).
    pub fn close(&mut self) {
        if self.port_status >= PortStatus::Open {
            self.port_status = PortStatus::Closed;
        }
        self.last_activity = None;
    }
}
