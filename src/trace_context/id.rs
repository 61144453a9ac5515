//! Trace and parent id generation.
//!
//! Ids are drawn from the operating system CSPRNG into stack buffers owned by
//! the calling frame, so concurrent `TraceParent` instances never share
//! scratch state.

use rand::rngs::OsRng;
use rand::RngCore;

/// Length in hex chars of a trace-id (16 bytes).
pub const TRACE_ID_LEN: usize = 32;

/// Length in hex chars of a parent-id (8 bytes).
pub const PARENT_ID_LEN: usize = 16;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Generate a random, non-zero trace-id.
pub fn new_trace_id() -> String {
    random_hex::<16>()
}

/// Generate a random, non-zero parent-id.
pub fn new_parent_id() -> String {
    random_hex::<8>()
}

fn random_hex<const N: usize>() -> String {
    let mut buf = [0u8; N];
    loop {
        OsRng.fill_bytes(&mut buf);
        // An all-zero id is invalid on the wire; redraw.
        if buf.iter().any(|b| *b != 0) {
            return encode_hex(&buf);
        }
    }
}

/// Lowercase hex encoding.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

/// True if `s` is exactly `len` lowercase hex digits.
pub fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// True if every char of `s` is `'0'`.
pub fn is_all_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_fixed_width() {
        let trace_id = new_trace_id();
        let parent_id = new_parent_id();
        assert!(is_lower_hex(&trace_id, TRACE_ID_LEN));
        assert!(is_lower_hex(&parent_id, PARENT_ID_LEN));
        assert!(!is_all_zero(&trace_id));
        assert!(!is_all_zero(&parent_id));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(new_trace_id(), new_trace_id());
        assert_ne!(new_parent_id(), new_parent_id());
    }

    #[test]
    fn hex_encoding_is_lowercase() {
        assert_eq!(encode_hex(&[0x00, 0xab, 0x0f, 0xff]), "00ab0fff");
    }

    #[test]
    fn hex_validation() {
        assert!(is_lower_hex("00f067aa0ba902b7", 16));
        assert!(!is_lower_hex("00F067AA0BA902B7", 16));
        assert!(!is_lower_hex("00f067aa0ba902b", 16));
        assert!(!is_lower_hex("00f067aa0ba902bz", 16));
    }

    #[test]
    fn ids_generated_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| new_parent_id()).collect::<Vec<_>>()))
            .collect();

        let mut all = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(is_lower_hex(&id, PARENT_ID_LEN));
                all.insert(id);
            }
        }
        assert_eq!(all.len(), 800);
    }
}
