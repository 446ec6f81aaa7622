//! Hash and HMAC primitives over the four specs LUKS1/LUKS2 headers name:
//! `sha1`, `sha256`, `sha512`, `ripemd160`.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

/// One of the hash algorithms a LUKS1/LUKS2 `hash_spec` string can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSpec {
    Sha1,
    Sha256,
    Sha512,
    Ripemd160,
}

impl HashSpec {
    /// Parse a header `hash_spec` string (e.g. `"sha256"`).
    pub fn parse(spec: &str) -> Result<Self> {
        match spec {
            "sha1" => Ok(HashSpec::Sha1),
            "sha256" => Ok(HashSpec::Sha256),
            "sha512" => Ok(HashSpec::Sha512),
            "ripemd160" => Ok(HashSpec::Ripemd160),
            other => Err(Error::Unsupported(format!("hash spec {other:?}"))),
        }
    }

    /// The textual form written back into headers.
    pub fn as_str(self) -> &'static str {
        match self {
            HashSpec::Sha1 => "sha1",
            HashSpec::Sha256 => "sha256",
            HashSpec::Sha512 => "sha512",
            HashSpec::Ripemd160 => "ripemd160",
        }
    }

    /// Digest output length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashSpec::Sha1 => 20,
            HashSpec::Sha256 => 32,
            HashSpec::Sha512 => 64,
            HashSpec::Ripemd160 => 20,
        }
    }
}

/// One-shot hash of `data` under `spec`.
pub fn hash(spec: HashSpec, data: &[u8]) -> Vec<u8> {
    match spec {
        HashSpec::Sha1 => Sha1::digest(data).to_vec(),
        HashSpec::Sha256 => Sha256::digest(data).to_vec(),
        HashSpec::Sha512 => Sha512::digest(data).to_vec(),
        HashSpec::Ripemd160 => Ripemd160::digest(data).to_vec(),
    }
}

/// HMAC tag of `data` under `key`, using `spec` as the underlying hash.
pub fn hmac(spec: HashSpec, key: &[u8], data: &[u8]) -> Vec<u8> {
    match spec {
        HashSpec::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashSpec::Sha256 => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashSpec::Sha512 => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashSpec::Ripemd160 => {
            let mut mac =
                Hmac::<Ripemd160>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}
