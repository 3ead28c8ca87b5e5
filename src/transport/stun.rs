//! Minimal STUN field extraction needed for endpoint dispatch.
//!
//! Only the message-class bit, the transaction id, and the USERNAME
//! attribute are read — this is routing metadata, not a validating STUN
//! parser. Attribute TLVs are padded to 4-byte boundaries per RFC 5389.

use super::listener::TransactionId;

const HEADER_LEN: usize = 20;
const USERNAME_ATTR_TYPE: u16 = 0x0006;

/// True if the message-type's class bits mark this a STUN *request*
/// (as opposed to a response or indication).
pub fn stun_is_request(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }
    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    // class bits are spread across bit 8 and bit 4 of the 14-bit type field
    let class = ((msg_type & 0x0100) >> 7) | ((msg_type & 0x0010) >> 4);
    class == 0b00
}

/// Extract the 96-bit transaction id (bytes 8..20).
pub fn stun_transaction_id(buf: &[u8]) -> Option<TransactionId> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let mut id = [0u8; 12];
    id.copy_from_slice(&buf[8..20]);
    Some(id)
}

/// Extract the USERNAME attribute, split on its ICE `local:remote` colon
/// into `(local, remote)` fragments.
pub fn stun_username(buf: &[u8]) -> Option<(String, String)> {
    let mut offset = HEADER_LEN;
    while offset + 4 <= buf.len() {
        let attr_type = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let attr_len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > buf.len() {
            return None;
        }
        if attr_type == USERNAME_ATTR_TYPE {
            let text = std::str::from_utf8(&buf[value_start..value_end]).ok()?;
            let mut parts = text.splitn(2, ':');
            let local = parts.next()?.to_string();
            let remote = parts.next().unwrap_or_default().to_string();
            return Some((local, remote));
        }
        let padded_len = attr_len.div_ceil(4) * 4;
        offset = value_start + padded_len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stun_request_with_username(user: &str) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0] = 0x00; // binding request
        buf[1] = 0x01;
        buf[4..8].copy_from_slice(&[0x21, 0x12, 0xA4, 0x42]);
        buf[8..20].copy_from_slice(&[7u8; 12]);
        let attr_len = user.len() as u16;
        buf.extend_from_slice(&USERNAME_ATTR_TYPE.to_be_bytes());
        buf.extend_from_slice(&attr_len.to_be_bytes());
        buf.extend_from_slice(user.as_bytes());
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        buf
    }

    #[test]
    fn extracts_transaction_id() {
        let buf = stun_request_with_username("bob:alice");
        assert_eq!(stun_transaction_id(&buf), Some([7u8; 12]));
    }

    #[test]
    fn extracts_username_fragments() {
        let buf = stun_request_with_username("bob:alice");
        assert_eq!(
            stun_username(&buf),
            Some(("bob".to_string(), "alice".to_string()))
        );
    }

    #[test]
    fn request_class_detected() {
        let buf = stun_request_with_username("bob:alice");
        assert!(stun_is_request(&buf));
    }
}
