//! Scenario 2: a STUN request sent through `send_stun_to` registers the
//! transaction, and the matching response is routed back to the same
//! listener exactly once.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;

use bridge_media_core::transport::{EndpointListener, UdpEndpoint};

struct CountingListener {
    ice_received: AtomicUsize,
}

impl EndpointListener for CountingListener {
    fn on_ice_received(&self, _from: SocketAddr, _packet: &[u8]) {
        self.ice_received.fetch_add(1, Ordering::SeqCst);
    }
    fn on_dtls_received(&self, _from: SocketAddr, _packet: &[u8]) {}
    fn on_rtp_received(&self, _from: SocketAddr, _packet: &[u8]) {}
    fn on_rtcp_received(&self, _from: SocketAddr, _packet: &[u8]) {}
    fn on_registered(&self) {}
    fn on_unregistered(&self) {}
}

fn stun_binding_request(txid: [u8; 12], username: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 20];
    buf[0] = 0x00;
    buf[1] = 0x01;
    buf[4..8].copy_from_slice(&[0x21, 0x12, 0xA4, 0x42]);
    buf[8..20].copy_from_slice(&txid);
    buf.extend_from_slice(&0x0006u16.to_be_bytes());
    buf.extend_from_slice(&(username.len() as u16).to_be_bytes());
    buf.extend_from_slice(username.as_bytes());
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
    buf
}

fn stun_binding_response(txid: [u8; 12]) -> Vec<u8> {
    let mut buf = vec![0u8; 20];
    buf[0] = 0x01; // success response class bits
    buf[1] = 0x01;
    buf[4..8].copy_from_slice(&[0x21, 0x12, 0xA4, 0x42]);
    buf[8..20].copy_from_slice(&txid);
    buf
}

#[tokio::test]
async fn stun_request_response_pairing_routes_back_once() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let endpoint = UdpEndpoint::new(socket);

    let listener: Arc<CountingListener> = Arc::new(CountingListener {
        ice_received: AtomicUsize::new(0),
    });
    endpoint.register_ice_user("bob".to_string(), listener.clone());
    endpoint.pump_jobs();

    let target: SocketAddr = "127.0.0.1:5000".parse().unwrap();
    let txid = [0xA5u8; 12];
    let request = Bytes::from(stun_binding_request(txid, "alice:bob"));
    endpoint
        .send_stun_to(target, txid, request)
        .await
        .expect("local socket can always send");

    let response = stun_binding_response(txid);
    endpoint.dispatch_received_packet(target, &response);

    assert_eq!(listener.ice_received.load(Ordering::SeqCst), 1);
}
