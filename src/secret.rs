//! §5: "master keys, derived keys, and split buffers are kept in
//! dedicated owned buffers that are zeroised on release." [`Secret`] is
//! that buffer — a `Vec<u8>` wrapped so it is wiped the moment it drops,
//! built on the `zeroize` crate rather than a hand-rolled `Drop` impl.
//!
//! `Debug` is redacted so an accidental `{:?}` in a log line never prints
//! key material; there is no `Deref` to `[u8]`, so a call site has to
//! reach for [`Secret::expose_secret`] on purpose rather than getting raw
//! bytes for free.

use std::fmt;

use zeroize::Zeroizing;

use crate::primitives::constant_time_eq;

/// An owned byte buffer zeroized on drop.
#[derive(Clone)]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Secret(Zeroizing::new(bytes))
    }

    /// Borrow the raw bytes, e.g. to feed a cipher or HMAC.
    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Secret::new(bytes)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}
impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes, redacted)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_contents_compare_equal() {
        assert_eq!(Secret::new(vec![1, 2, 3]), Secret::new(vec![1, 2, 3]));
    }

    #[test]
    fn differing_contents_compare_unequal() {
        assert_ne!(Secret::new(vec![1, 2, 3]), Secret::new(vec![1, 2, 4]));
    }

    #[test]
    fn debug_does_not_print_the_bytes() {
        let rendered = format!("{:?}", Secret::new(vec![0xAB; 32]));
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("32 bytes"));
    }
}
