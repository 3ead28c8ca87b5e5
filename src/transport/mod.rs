//! UDP endpoint demultiplexing.
//!
//! One [`UdpEndpoint`] owns a socket and three listener tables keyed by
//! ICE username, DTLS source address, and pending STUN transaction id.
//! Reads happen wait-free against the tables; all table mutation is
//! serialised onto the endpoint's own receive-job queue.

mod endpoint;
mod listener;
mod stun;

pub use endpoint::UdpEndpoint;
pub use listener::{EndpointListener, ListenerHandle, TransactionId};
pub use stun::{stun_is_request, stun_transaction_id, stun_username};
