//! The TCP control acceptor (§4.F): one listener on `CONTROL_PORT`, one
//! task per connected peer reading CR-terminated lines and dispatching them.

use std::net::Ipv4Addr;
use std::rc::Rc;

use socket2::{Domain, Socket, Type};
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::controller::Controller;
use crate::error::SurrogateError;
use crate::peer::{Peer, PeerHandle, PortStatus};

const READ_BUF_SIZE: usize = 4096;

/// Bind with `SO_REUSEADDR` so a restarted process doesn't wait out
/// `TIME_WAIT` on the control port.
pub async fn bind(addr: Ipv4Addr, port: u16) -> Result<TcpListener, SurrogateError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&std::net::SocketAddr::from((addr, port)).into())?;
    socket.listen(128)?;
    TcpListener::from_std(socket.into()).map_err(SurrogateError::from)
}

/// Accept loop: every connection not excluded by the host restriction gets
/// a `Peer`, registered and handed its own read/dispatch/flush task.
pub async fn run(controller: Controller, listener: TcpListener) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "control accept failed");
                continue;
            }
        };

        let std::net::SocketAddr::V4(addr_v4) = addr else {
            continue;
        };

        let allowed = crate::resolver::connection_is_allowed(&controller, addr_v4.ip()).await;
        if !allowed {
            tracing::debug!(peer = %addr_v4, "rejected by host restriction");
            continue;
        }

        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!(peer = %addr_v4, error = %err, "failed to set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let peer = Peer::new(addr_v4, Rc::downgrade(&controller.0));
        peer.borrow_mut().attach_write_half(write_half);
        peer.borrow_mut().port_status = PortStatus::Open;
        controller.register_peer(&peer);

        tracing::info!(peer = %addr_v4, "control connection accepted");
        tokio::task::spawn_local(run_peer_session(controller.clone(), peer, read_half));
    }
}

async fn run_peer_session(
    controller: Controller,
    peer: PeerHandle,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(error = %err, "control read failed, closing connection");
                break;
            }
        };

        peer.borrow_mut().on_read(&buf[..n], tokio::time::Instant::now());
        let lines = peer.borrow_mut().take_complete_messages();
        if let Some(lines) = lines {
            for line in lines {
                crate::dispatcher::handle_line(&peer, &controller.0, &line);
            }
            flush_peer(&peer).await;
        }
    }

    controller.disconnect_peer(&peer);
    tracing::info!(peer = %peer.borrow().address, "control connection closed");
}

/// Write out everything queued on `peer`, releasing the `RefCell` borrow
/// for the duration of each write so nothing else touching this peer
/// panics on a held borrow across an await point.
pub async fn flush_peer(peer: &PeerHandle) {
    loop {
        let pending = {
            let p = peer.borrow();
            if !p.has_pending_write() {
                return;
            }
            p.pending_write().to_vec()
        };

        let Some(mut half) = peer.borrow_mut().take_write_half() else {
            return;
        };

        let result = half.write_all(&pending).await;
        let len = pending.len();
        let mut p = peer.borrow_mut();
        p.restore_write_half(half);
        match result {
            Ok(()) => p.advance_written(len),
            Err(err) => {
                tracing::debug!(error = %err, "control write failed, closing connection");
                p.close();
                return;
            }
        }
    }
}
