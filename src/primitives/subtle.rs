//! Constant-time comparison for digest checks.
//!
//! The teacher vendored a copy of the `subtle` crate's `Choice` type rather
//! than depending on it; this core just depends on the real crate directly
//! (it is already a normal member of the RustCrypto family this crate
//! otherwise pulls `sha2`/`hmac`/`pbkdf2` from), and exposes the one
//! operation the rest of the core needs.

use subtle::ConstantTimeEq;

/// Compare two byte strings in constant time. Returns `false` immediately
/// (in non-constant time) if the lengths differ, since length is not
/// considered secret anywhere this is called from.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_buffers_match() {
        assert!(constant_time_eq(b"abcdef", b"abcdef"));
    }

    #[test]
    fn differing_buffers_do_not_match() {
        assert!(!constant_time_eq(b"abcdef", b"abcxef"));
    }

    #[test]
    fn differing_lengths_do_not_match() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
