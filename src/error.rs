//! Error kinds for the LUKS control core.
//!
//! Mirrors the flat result-code style of the library this core was
//! distilled from (`vic_result_t`): one enum, one kind per failure mode
//! named in the specification, no chained `thiserror` macro.

use std::fmt;

/// Everything that can go wrong while formatting, opening, or mutating a
/// LUKS1/LUKS2 header.
#[derive(Debug)]
pub enum Error {
    /// A caller-supplied parameter was invalid (bad cipher string, zero
    /// stripes, unsupported key length, ...). Carries a short static
    /// description of which parameter.
    BadParameter(&'static str),
    /// The header magic did not match `"LUKS\xBA\xBE"` / `"SKUL\xBA\xBE"`.
    BadSignature,
    /// The header's version field was not one this core understands.
    BadVersion(u16),
    /// The UUID text did not parse as a canonical UUID.
    BadUuid,
    /// The block device's block size is not supported (must divide 512-byte
    /// sectors evenly).
    BadBlockSize(usize),
    /// A caller-supplied output buffer was smaller than required.
    BufferTooSmall,
    /// A cipher, hash, KDF, or integrity spec named in the header (or
    /// requested by the caller) is not implemented by this core. Carries
    /// the unsupported spec string, preserving the finer distinction
    /// `vic_result_t` draws between `VIC_UNSUPPORTED`,
    /// `VIC_UNKNOWN_KEYSLOT_TYPE`, and `VIC_UNKNOWN_KDF_TYPE`.
    Unsupported(String),
    /// All keyslots are occupied; no free slot for enrollment.
    OutOfKeyslots,
    /// Caller tried to remove the only remaining active keyslot.
    LastKeyslot,
    /// No active keyslot decrypted to a master key matching the stored
    /// digest. Never disambiguated per-slot (constant-time requirement).
    KeyLookupFailed,
    /// A master key or derived key would not fit in a `Key` buffer.
    KeyTooBig,
    /// The key-derivation function failed (zero iterations, unsupported
    /// hash, underlying KDF crate error).
    KdfFailed,
    /// AES encryption of keyslot or payload material failed.
    EncryptFailed,
    /// AES decryption of keyslot or payload material failed.
    DecryptFailed,
    /// Anti-forensic split failed (buffer sizing mismatch).
    AfSplitFailed,
    /// Anti-forensic merge failed (buffer sizing mismatch).
    AfMergeFailed,
    /// Neither LUKS2 binary header copy could be read and checksum-verified.
    HeaderReadFailed,
    /// Writing a binary header (or its JSON metadata area) to the device
    /// failed.
    HeaderWriteFailed,
    /// Reading keyslot key material from its on-disk area failed.
    KeyMaterialReadFailed,
    /// Writing keyslot key material to its on-disk area failed.
    KeyMaterialWriteFailed,
    /// The backing device is smaller than the layout requires.
    DeviceTooSmall,
    /// An I/O error from the block device.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadParameter(what) => write!(f, "bad parameter: {what}"),
            Error::BadSignature => write!(f, "bad header signature"),
            Error::BadVersion(v) => write!(f, "unsupported header version {v}"),
            Error::BadUuid => write!(f, "malformed UUID"),
            Error::BadBlockSize(n) => write!(f, "unsupported block size {n}"),
            Error::BufferTooSmall => write!(f, "output buffer too small"),
            Error::Unsupported(what) => write!(f, "unsupported: {what}"),
            Error::OutOfKeyslots => write!(f, "no free keyslot"),
            Error::LastKeyslot => write!(f, "refusing to remove the last active keyslot"),
            Error::KeyLookupFailed => write!(f, "no keyslot matched the supplied passphrase"),
            Error::KeyTooBig => write!(f, "key exceeds maximum supported size"),
            Error::KdfFailed => write!(f, "key derivation failed"),
            Error::EncryptFailed => write!(f, "encryption failed"),
            Error::DecryptFailed => write!(f, "decryption failed"),
            Error::AfSplitFailed => write!(f, "anti-forensic split failed"),
            Error::AfMergeFailed => write!(f, "anti-forensic merge failed"),
            Error::HeaderReadFailed => write!(f, "header read failed"),
            Error::HeaderWriteFailed => write!(f, "header write failed"),
            Error::KeyMaterialReadFailed => write!(f, "key material read failed"),
            Error::KeyMaterialWriteFailed => write!(f, "key material write failed"),
            Error::DeviceTooSmall => write!(f, "device too small for requested layout"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Crate-wide result alias, one per error domain in the teacher's style.
pub type Result<T> = std::result::Result<T, Error>;
