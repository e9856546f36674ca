use std::rc::Rc;

use tokio::time::Instant;

use crate::peer::{PeerHandle, PortStatus};

/// Active peers plus master election (§4.D). An ordered list rather than a
/// map: peer identity is the `Rc` pointer, there's no external key to
/// index by, and the list is small (a handful of control sessions).
#[derive(Default)]
pub struct PeerRegistry {
    peers: Vec<PeerHandle>,
    master: Option<PeerHandle>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, peer: PeerHandle) {
        self.peers.push(peer);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerHandle> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn master(&self) -> Option<&PeerHandle> {
        self.master.as_ref()
    }

    pub fn is_master(&self, peer: &PeerHandle) -> bool {
        self.master.as_ref().is_some_and(|m| Rc::ptr_eq(m, peer))
    }

    /// SetMaster(1): this peer becomes master, port-status Connected.
    pub fn set_master(&mut self, peer: &PeerHandle) {
        peer.borrow_mut().port_status = PortStatus::Connected;
        self.master = Some(Rc::clone(peer));
    }

    /// SetMaster(0), or clearing on read-half close: releases the owning
    /// reference. `to_ready` controls whether the former master's
    /// port-status drops to `Ready` (explicit SetMaster(0)) or is left
    /// alone (peer is being torn down anyway).
    pub fn clear_master(&mut self, to_ready: bool) {
        if let Some(master) = self.master.take() {
            if to_ready {
                master.borrow_mut().port_status = PortStatus::Ready;
            }
        }
    }

    pub fn clear_master_if(&mut self, peer: &PeerHandle) {
        if self.is_master(peer) {
            self.clear_master(false);
        }
    }

    /// Rebuild the list, dropping any peer whose `last_activity + alive_time`
    /// has passed (or whose `last_activity` is the forced-expire sentinel).
    /// Expired peers are closed (both halves, by the caller, who gets them
    /// back) and, if any was master, master is cleared.
    pub fn sweep_expired(&mut self, alive_time_secs: u32, now: Instant) -> Vec<PeerHandle> {
        let alive_time = std::time::Duration::from_secs(alive_time_secs as u64);
        let (keep, expired): (Vec<_>, Vec<_>) = self.peers.drain(..).partition(|peer| {
            match peer.borrow().last_activity {
                Some(last) => now.saturating_duration_since(last) < alive_time,
                None => false,
            }
        });
        self.peers = keep;
        for peer in &expired {
            self.clear_master_if(peer);
        }
        expired
    }

    /// Drop every peer immediately, clearing master. Used by `EndDiscoverability`.
    pub fn invalidate_all(&mut self) -> Vec<PeerHandle> {
        self.master = None;
        std::mem::take(&mut self.peers)
    }

    /// Drop a single peer on ordinary disconnect, clearing master first if
    /// it held the seat.
    pub fn remove(&mut self, peer: &PeerHandle) {
        self.clear_master_if(peer);
        self.peers.retain(|p| !Rc::ptr_eq(p, peer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::Peer;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::rc::Weak;

    fn test_peer() -> PeerHandle {
        Peer::new(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1234), Weak::new())
    }

    #[test]
    fn set_master_then_clear_drops_the_reference() {
        let mut registry = PeerRegistry::new();
        let peer = test_peer();
        registry.insert(Rc::clone(&peer));
        registry.set_master(&peer);
        assert!(registry.is_master(&peer));
        assert_eq!(peer.borrow().port_status, PortStatus::Connected);

        registry.clear_master(true);
        assert!(registry.master().is_none());
        assert_eq!(peer.borrow().port_status, PortStatus::Ready);
    }

    #[test]
    fn second_set_master_transfers_mastership_atomically() {
        let mut registry = PeerRegistry::new();
        let a = test_peer();
        let b = test_peer();
        registry.insert(Rc::clone(&a));
        registry.insert(Rc::clone(&b));
        registry.set_master(&a);
        registry.set_master(&b);
        assert!(!registry.is_master(&a));
        assert!(registry.is_master(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_stale_peers_and_keeps_active_ones() {
        let mut registry = PeerRegistry::new();
        let stale = test_peer();
        let fresh = test_peer();
        stale.borrow_mut().last_activity = Some(Instant::now());
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        fresh.borrow_mut().last_activity = Some(Instant::now());
        registry.insert(Rc::clone(&stale));
        registry.insert(Rc::clone(&fresh));

        let expired = registry.sweep_expired(20, Instant::now());
        assert_eq!(expired.len(), 1);
        assert!(Rc::ptr_eq(&expired[0], &stale));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn forced_expire_sentinel_is_removed_on_next_sweep() {
        let mut registry = PeerRegistry::new();
        let peer = test_peer();
        peer.borrow_mut().last_activity = None;
        registry.insert(Rc::clone(&peer));
        let expired = registry.sweep_expired(20, Instant::now());
        assert_eq!(expired.len(), 1);
    }
}
