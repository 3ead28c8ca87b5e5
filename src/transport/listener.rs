//! Listener contract and the three lock-free tables an endpoint dispatches
//! through.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

/// A 96-bit STUN transaction id.
pub type TransactionId = [u8; 12];

/// Receives classified packets and registration callbacks from a
/// [`super::UdpEndpoint`]. No method may block.
pub trait EndpointListener: Send + Sync {
    fn on_ice_received(&self, from: SocketAddr, packet: &[u8]);
    fn on_dtls_received(&self, from: SocketAddr, packet: &[u8]);
    fn on_rtp_received(&self, from: SocketAddr, packet: &[u8]);
    fn on_rtcp_received(&self, from: SocketAddr, packet: &[u8]);
    fn on_registered(&self);
    fn on_unregistered(&self);
}

pub type ListenerHandle = Arc<dyn EndpointListener>;

fn same_listener(a: &ListenerHandle, b: &ListenerHandle) -> bool {
    Arc::ptr_eq(a, b)
}

/// The three tables a [`UdpEndpoint`] dispatches through. Reads are
/// wait-free (`DashMap` shards internally); writes only ever happen from
/// inside a job popped off the endpoint's receive-job queue, so there is
/// never more than one writer at a time despite the map being `Sync`.
#[derive(Default)]
pub struct ListenerTables {
    pub(super) ice_by_user: DashMap<String, ListenerHandle>,
    pub(super) dtls_by_source: DashMap<SocketAddr, ListenerHandle>,
    pub(super) ice_response_pending: DashMap<TransactionId, ListenerHandle>,
}

impl ListenerTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn insert_ice_user(&self, user: String, listener: ListenerHandle) -> bool {
        self.ice_by_user.insert(user, listener).is_none()
    }

    pub(super) fn insert_dtls_source(
        &self,
        addr: SocketAddr,
        listener: ListenerHandle,
    ) -> Option<ListenerHandle> {
        self.dtls_by_source.insert(addr, listener)
    }

    pub(super) fn insert_response_pending(&self, txid: TransactionId, listener: ListenerHandle) {
        self.ice_response_pending.insert(txid, listener);
    }

    pub(super) fn cancel_response_pending(&self, txid: &TransactionId) {
        self.ice_response_pending.remove(txid);
    }

    /// Remove every entry in every table that points at `listener`,
    /// returning how many ICE and DTLS registrations were erased
    /// (STUN-response entries piggyback on the ICE registration and do not
    /// get a separate unregister notification).
    pub(super) fn remove_listener(&self, listener: &ListenerHandle) -> (usize, usize) {
        let before_ice = self.ice_by_user.len();
        self.ice_by_user.retain(|_, v| !same_listener(v, listener));
        let ice_removed = before_ice - self.ice_by_user.len();

        let before_dtls = self.dtls_by_source.len();
        self.dtls_by_source
            .retain(|_, v| !same_listener(v, listener));
        let dtls_removed = before_dtls - self.dtls_by_source.len();

        self.ice_response_pending
            .retain(|_, v| !same_listener(v, listener));

        (ice_removed, dtls_removed)
    }

    /// Erase every `dtlsBySource` entry for `listener` except `keep_port`.
    pub(super) fn focus_dtls(
        &self,
        listener: &ListenerHandle,
        keep_port: u16,
    ) -> Vec<SocketAddr> {
        let mut erased = Vec::new();
        self.dtls_by_source.retain(|addr, v| {
            if same_listener(v, listener) && addr.port() != keep_port {
                erased.push(*addr);
                false
            } else {
                true
            }
        });
        erased
    }
}
