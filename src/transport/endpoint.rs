//! A single UDP socket's demultiplexing endpoint.

use std::net::SocketAddr;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::classify::{is_dtls, is_rtcp, is_rtp, is_stun};
use crate::concurrency::MpmcQueue;

use super::listener::{EndpointListener, ListenerHandle, ListenerTables, TransactionId};
use super::stun::{stun_is_request, stun_transaction_id, stun_username};

type Job = Box<dyn FnOnce(&ListenerTables) + Send>;

const RECEIVE_JOB_QUEUE_CAPACITY: usize = 1024;

/// Owns one UDP socket, classifies incoming datagrams, and routes them to
/// registered listeners. All listener-table mutation happens through jobs
/// posted to a private queue and drained on the receive path, giving
/// single-writer semantics over otherwise wait-free reads.
pub struct UdpEndpoint {
    socket: UdpSocket,
    tables: ListenerTables,
    jobs: MpmcQueue<Job>,
    default_listener: ArcSwapOption<dyn EndpointListener>,
}

impl UdpEndpoint {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            tables: ListenerTables::new(),
            jobs: MpmcQueue::new(RECEIVE_JOB_QUEUE_CAPACITY),
            default_listener: ArcSwapOption::empty(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Set the listener that receives DTLS datagrams with no matching
    /// source-address registration.
    pub fn set_default_listener(&self, listener: Option<ListenerHandle>) {
        self.default_listener.store(listener);
    }

    fn post(&self, job: Job) {
        if self.jobs.push(job).is_err() {
            warn!("endpoint receive-job queue full, dropping table mutation");
        }
    }

    /// Apply any table mutations queued since the last call. Must be
    /// called from the single thread that owns this endpoint's receive
    /// loop.
    pub fn pump_jobs(&self) {
        while let Some(job) = self.jobs.pop() {
            job(&self.tables);
        }
    }

    /// Idempotent: a no-op if `user` is already registered.
    pub fn register_ice_user(&self, user: String, listener: ListenerHandle) {
        self.post(Box::new(move |tables| {
            if tables.insert_ice_user(user, listener.clone()) {
                listener.on_registered();
            }
        }));
    }

    /// Insert-or-swap the listener bound to `addr`. No-op if `addr` is
    /// already bound to the same listener.
    pub fn register_dtls_source(&self, addr: SocketAddr, listener: ListenerHandle) {
        self.post(Box::new(move |tables| {
            match tables.insert_dtls_source(addr, listener.clone()) {
                Some(old) if std::sync::Arc::ptr_eq(&old, &listener) => {}
                Some(old) => {
                    old.on_unregistered();
                    listener.on_registered();
                }
                None => listener.on_registered(),
            }
        }));
    }

    /// Erase every registration (ICE and DTLS) belonging to `listener`,
    /// firing `onUnregistered` once per erased registration.
    pub fn unregister_listener(&self, listener: ListenerHandle) {
        self.post(Box::new(move |tables| {
            let (ice_removed, dtls_removed) = tables.remove_listener(&listener);
            for _ in 0..(ice_removed + dtls_removed) {
                listener.on_unregistered();
            }
        }));
    }

    /// Keep only the DTLS registration on `keep_port` for `listener`,
    /// erasing any others (used once a peer's active remote port is known).
    pub fn focus_listener(&self, listener: ListenerHandle, keep_port: u16) {
        self.post(Box::new(move |tables| {
            let erased = tables.focus_dtls(&listener, keep_port);
            for _ in erased {
                listener.on_unregistered();
            }
        }));
    }

    pub fn cancel_stun_transaction(&self, txid: TransactionId) {
        self.post(Box::new(move |tables| {
            tables.cancel_response_pending(&txid);
        }));
    }

    /// Send `bytes` to `target`. If `bytes` is a STUN request and `txid`
    /// is not already pending, register the local ICE user's listener to
    /// receive the matching response.
    pub async fn send_stun_to(
        &self,
        target: SocketAddr,
        txid: TransactionId,
        bytes: Bytes,
    ) -> std::io::Result<usize> {
        if stun_is_request(&bytes) && !self.tables.ice_response_pending.contains_key(&txid) {
            if let Some((_remote_user, local_user)) = stun_username(&bytes) {
                if let Some(listener) = self.tables.ice_by_user.get(&local_user) {
                    self.tables
                        .insert_response_pending(txid, listener.clone());
                } else {
                    warn!(user = %local_user, "sendStunTo: no listener for ICE user");
                }
            }
        }
        self.socket.send_to(&bytes, target).await
    }

    /// Classify `buf` (received from `from`) and deliver it to the
    /// matching listener. Unrecognised datagrams are dropped silently —
    /// logging here would let an attacker flood the log from off-host.
    pub fn dispatch_received_packet(&self, from: SocketAddr, buf: &[u8]) {
        if is_stun(buf) {
            if stun_is_request(buf) {
                if let Some((local_user, _remote)) = stun_username(buf) {
                    if let Some(listener) = self.tables.ice_by_user.get(&local_user) {
                        listener.on_ice_received(from, buf);
                    }
                }
            } else if let Some(txid) = stun_transaction_id(buf) {
                if let Some((_, listener)) = self.tables.ice_response_pending.remove(&txid) {
                    listener.on_ice_received(from, buf);
                }
            }
            return;
        }

        if is_dtls(buf) {
            if let Some(listener) = self.tables.dtls_by_source.get(&from) {
                listener.on_dtls_received(from, buf);
            } else if let Some(default) = self.default_listener.load_full() {
                default.on_dtls_received(from, buf);
            }
            return;
        }

        if is_rtcp(buf) {
            if let Some(listener) = self.tables.dtls_by_source.get(&from) {
                listener.on_rtcp_received(from, buf);
            }
            return;
        }

        if is_rtp(buf) {
            if let Some(listener) = self.tables.dtls_by_source.get(&from) {
                listener.on_rtp_received(from, buf);
            }
        }
    }

    /// Pump pending table jobs, then receive and dispatch one datagram.
    pub async fn receive_one(&self, buf: &mut [u8]) -> std::io::Result<()> {
        self.pump_jobs();
        let (len, from) = self.socket.recv_from(buf).await?;
        self.dispatch_received_packet(from, &buf[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingListener {
        registered: AtomicUsize,
        unregistered: AtomicUsize,
        ice_received: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                registered: AtomicUsize::new(0),
                unregistered: AtomicUsize::new(0),
                ice_received: AtomicUsize::new(0),
            })
        }
    }

    impl EndpointListener for CountingListener {
        fn on_ice_received(&self, _from: SocketAddr, _packet: &[u8]) {
            self.ice_received.fetch_add(1, Ordering::SeqCst);
        }
        fn on_dtls_received(&self, _from: SocketAddr, _packet: &[u8]) {}
        fn on_rtp_received(&self, _from: SocketAddr, _packet: &[u8]) {}
        fn on_rtcp_received(&self, _from: SocketAddr, _packet: &[u8]) {}
        fn on_registered(&self) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unregistered(&self) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn bound_endpoint() -> UdpEndpoint {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        UdpEndpoint::new(socket)
    }

    #[tokio::test]
    async fn register_then_unregister_fires_callbacks_once_each() {
        let endpoint = bound_endpoint().await;
        let listener = CountingListener::new();
        endpoint.register_ice_user("bob".into(), listener.clone());
        endpoint.pump_jobs();
        assert_eq!(listener.registered.load(Ordering::SeqCst), 1);

        endpoint.unregister_listener(listener.clone());
        endpoint.pump_jobs();
        assert!(!endpoint.tables.ice_by_user.contains_key("bob"));
        assert_eq!(listener.unregistered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stun_request_routes_by_username() {
        let endpoint = bound_endpoint().await;
        let listener = CountingListener::new();
        endpoint.register_ice_user("bob".into(), listener.clone());
        endpoint.pump_jobs();

        let mut buf = vec![0u8; 20];
        buf[0] = 0x00;
        buf[4..8].copy_from_slice(&[0x21, 0x12, 0xA4, 0x42]);
        buf.extend_from_slice(&0x0006u16.to_be_bytes());
        buf.extend_from_slice(&3u16.to_be_bytes());
        buf.extend_from_slice(b"bob");
        buf.push(0);

        let from: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        endpoint.dispatch_received_packet(from, &buf);
        assert_eq!(listener.ice_received.load(Ordering::SeqCst), 1);
    }
}
