//! C6: assembling a device-mapper `crypt` mapping request from a LUKS
//! header and a recovered master key. Building and submitting the actual
//! DM ioctl/netlink request is out of scope (`spec.md` §1); this module
//! stops at producing the request a caller hands to that layer.

use crate::config::IntegrityAlg;
use crate::error::{Error, Result};
use crate::secret::Secret;

/// A fully-resolved request to activate a mapping — everything a
/// device-mapper `crypt` (or `crypt`+`integrity`) target needs, with no
/// further header lookups required.
#[derive(Debug, Clone)]
pub struct MappingRequest {
    pub name: String,
    pub cipher: String,
    pub master_key: Secret,
    pub iv_offset: u64,
    pub device_path: String,
    pub payload_offset_sectors: u64,
    pub size_sectors: Option<u64>,
    pub sector_size: u32,
    pub integrity: Option<IntegrityMapping>,
}

#[derive(Debug, Clone)]
pub struct IntegrityMapping {
    pub capi_name: String,
    pub tag_size: usize,
}

impl MappingRequest {
    /// The `capi:<cipher>[-<integrity>]-plain64` string dm-crypt expects
    /// in `CRYPT_TARGET` table lines, per §4.6/§11.4.
    pub fn capi_string(&self) -> String {
        match &self.integrity {
            Some(integrity) => format!(
                "capi:authenc({},xts(aes))-plain64",
                integrity.capi_name
            ),
            None => format!("capi:{}-plain64", self.cipher),
        }
    }
}

/// Build a LUKS1 activation request: payload starts at `payload_offset`
/// sectors, runs to the end of the device (LUKS1 has no explicit size
/// field).
pub fn build_luks1_request(
    name: &str,
    device_path: &str,
    cipher: &str,
    master_key: &[u8],
    payload_offset_sectors: u64,
) -> Result<MappingRequest> {
    if master_key.is_empty() {
        return Err(Error::KeyTooBig);
    }
    Ok(MappingRequest {
        name: name.to_string(),
        cipher: cipher.to_string(),
        master_key: Secret::new(master_key.to_vec()),
        iv_offset: 0,
        device_path: device_path.to_string(),
        payload_offset_sectors,
        size_sectors: None,
        sector_size: 512,
        integrity: None,
    })
}

/// Build a LUKS2 activation request from a resolved segment: `size`
/// `"dynamic"` maps to `size_sectors: None` (table line runs to the end
/// of the device); any other value is a decimal byte count converted to
/// `sector_size`-sized sectors.
pub fn build_luks2_request(
    name: &str,
    device_path: &str,
    cipher: &str,
    master_key: &[u8],
    payload_offset_bytes: u64,
    size_bytes: Option<u64>,
    sector_size: u32,
    integrity: Option<IntegrityAlg>,
) -> Result<MappingRequest> {
    if master_key.is_empty() {
        return Err(Error::KeyTooBig);
    }
    if sector_size == 0 || sector_size % 512 != 0 {
        return Err(Error::BadBlockSize(sector_size as usize));
    }

    Ok(MappingRequest {
        name: name.to_string(),
        cipher: cipher.to_string(),
        master_key: Secret::new(master_key.to_vec()),
        iv_offset: 0,
        device_path: device_path.to_string(),
        payload_offset_sectors: payload_offset_bytes / sector_size as u64,
        size_sectors: size_bytes.map(|b| b / sector_size as u64),
        sector_size,
        integrity: integrity.map(|alg| IntegrityMapping {
            capi_name: alg.capi_name().to_string(),
            tag_size: alg.tag_size(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luks1_request_has_no_explicit_size() {
        let request =
            build_luks1_request("mydisk", "/dev/sda1", "aes-xts-plain64", &[0x11; 32], 4096)
                .unwrap();
        assert_eq!(request.size_sectors, None);
        assert_eq!(request.capi_string(), "capi:aes-xts-plain64-plain64");
    }

    #[test]
    fn luks2_dynamic_segment_has_no_explicit_size() {
        let request = build_luks2_request(
            "mydisk",
            "/dev/sda1",
            "aes-xts-plain64",
            &[0x22; 32],
            16 * 1024 * 1024,
            None,
            512,
            None,
        )
        .unwrap();
        assert_eq!(request.size_sectors, None);
        assert_eq!(request.payload_offset_sectors, 32768);
    }

    #[test]
    fn luks2_integrity_uses_authenc_capi_string() {
        let request = build_luks2_request(
            "mydisk",
            "/dev/sda1",
            "aes-xts-plain64",
            &[0x33; 32],
            0,
            Some(1 << 20),
            512,
            Some(IntegrityAlg::HmacSha256),
        )
        .unwrap();
        assert_eq!(
            request.capi_string(),
            "capi:authenc(hmac(sha256),xts(aes))-plain64"
        );
        assert_eq!(request.size_sectors, Some(2048));
    }

    #[test]
    fn rejects_empty_master_key() {
        assert!(build_luks1_request("n", "/dev/sda", "aes-xts-plain64", &[], 0).is_err());
    }

    #[test]
    fn rejects_sub_sector_size() {
        assert!(build_luks2_request(
            "n",
            "/dev/sda",
            "aes-xts-plain64",
            &[0x01; 32],
            0,
            None,
            511,
            None
        )
        .is_err());
    }
}
