//! On-disk header lifecycle for LUKS1/LUKS2 volumes.
//!
//! Covers the binary header formats, the JSON metadata layer LUKS2 adds,
//! the anti-forensic splitter, and the keyslot enroll/recover/remove/
//! change pipeline built on top of both. Does not touch block-device
//! attachment, the device-mapper ioctl/netlink surface, or verity
//! hash-tree construction — a caller wires this crate's [`Luks`] facade
//! and [`activation::MappingRequest`] output into whatever talks to the
//! kernel.

pub mod activation;
pub mod af;
pub mod config;
pub mod device;
pub mod error;
pub mod keyslot_pipeline;
pub mod luks;
pub mod luks1;
pub mod luks2;
pub mod primitives;
pub mod secret;

pub use config::{FormatOptions, IntegrityAlg, KdfParams};
pub use device::{BlockDevice, FileBlockDevice, MemBlockDevice};
pub use error::{Error, Result};
pub use luks::{Luks, LuksStat, LuksVersion};
pub use secret::Secret;
