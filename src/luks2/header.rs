//! C4: the LUKS2 binary header pair — two identical-format 4096-byte
//! headers (primary at device offset 0, secondary at `hdr_size` by
//! default 16 KiB), each immediately followed by its own JSON metadata
//! area. Selection between the two copies follows §4.4's seqid table.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const MAGIC_PRIMARY: [u8; 6] = [b'L', b'U', b'K', b'S', 0xBA, 0xBE];
pub const MAGIC_SECONDARY: [u8; 6] = [b'S', b'K', b'U', b'L', 0xBA, 0xBE];
pub const VERSION: u16 = 2;
pub const BINARY_HEADER_SIZE: usize = 4096;
pub const DEFAULT_SECONDARY_OFFSET: u64 = 16 * 1024;
pub const DEFAULT_JSON_AREA_SIZE: usize = 12 * 1024;

const LABEL_SIZE: usize = 48;
const CSUM_ALG_SIZE: usize = 32;
const SALT_SIZE: usize = 64;
const UUID_SIZE: usize = 40;
const SUBSYSTEM_SIZE: usize = LABEL_SIZE;
const CSUM_SIZE: usize = 64;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 6;
const OFF_HDR_SIZE: usize = 8;
const OFF_SEQID: usize = 16;
const OFF_LABEL: usize = 24;
const OFF_CSUM_ALG: usize = OFF_LABEL + LABEL_SIZE;
const OFF_SALT: usize = OFF_CSUM_ALG + CSUM_ALG_SIZE;
const OFF_UUID: usize = OFF_SALT + SALT_SIZE;
const OFF_SUBSYSTEM: usize = OFF_UUID + UUID_SIZE;
const OFF_HDR_OFFSET: usize = OFF_SUBSYSTEM + SUBSYSTEM_SIZE;
const OFF_PADDING: usize = OFF_HDR_OFFSET + 8;
const OFF_CSUM: usize = OFF_PADDING + 184;
const OFF_PADDING4096: usize = OFF_CSUM + CSUM_SIZE;

const _: () = assert!(OFF_PADDING4096 + 7 * 512 == BINARY_HEADER_SIZE);

/// Which of the two on-disk copies a binary header is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSlot {
    Primary,
    Secondary,
}

fn read_fixed_ascii(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn write_fixed_ascii(dst: &mut [u8], s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() >= dst.len() {
        return Err(Error::BadParameter("fixed-width ASCII field too long"));
    }
    dst.fill(0);
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// One 4096-byte LUKS2 binary header, parsed independent of its JSON
/// payload.
#[derive(Debug, Clone)]
pub struct Luks2BinaryHeader {
    pub slot: HeaderSlot,
    pub hdr_size: u64,
    pub seqid: u64,
    pub label: String,
    pub csum_alg: String,
    pub salt: [u8; SALT_SIZE],
    pub uuid: String,
    pub subsystem: String,
    pub hdr_offset: u64,
    pub csum: [u8; CSUM_SIZE],
}

impl Luks2BinaryHeader {
    /// Parse the fixed 4096-byte binary header, validating magic/version
    /// against the expected `slot`. Does not verify the checksum — call
    /// [`Self::verify_checksum`] with the JSON area once it's been read.
    pub fn parse(slot: HeaderSlot, buf: &[u8]) -> Result<Self> {
        if buf.len() < BINARY_HEADER_SIZE {
            return Err(Error::BufferTooSmall);
        }
        let expected_magic = match slot {
            HeaderSlot::Primary => MAGIC_PRIMARY,
            HeaderSlot::Secondary => MAGIC_SECONDARY,
        };
        if buf[OFF_MAGIC..OFF_MAGIC + 6] != expected_magic {
            return Err(Error::BadSignature);
        }
        let version = u16::from_be_bytes([buf[OFF_VERSION], buf[OFF_VERSION + 1]]);
        if version != VERSION {
            return Err(Error::BadVersion(version));
        }

        let hdr_size = u64::from_be_bytes(buf[OFF_HDR_SIZE..OFF_HDR_SIZE + 8].try_into().unwrap());
        let seqid = u64::from_be_bytes(buf[OFF_SEQID..OFF_SEQID + 8].try_into().unwrap());
        let hdr_offset =
            u64::from_be_bytes(buf[OFF_HDR_OFFSET..OFF_HDR_OFFSET + 8].try_into().unwrap());

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&buf[OFF_SALT..OFF_SALT + SALT_SIZE]);
        let mut csum = [0u8; CSUM_SIZE];
        csum.copy_from_slice(&buf[OFF_CSUM..OFF_CSUM + CSUM_SIZE]);

        Ok(Luks2BinaryHeader {
            slot,
            hdr_size,
            seqid,
            label: read_fixed_ascii(&buf[OFF_LABEL..OFF_CSUM_ALG]),
            csum_alg: read_fixed_ascii(&buf[OFF_CSUM_ALG..OFF_SALT]),
            salt,
            uuid: read_fixed_ascii(&buf[OFF_UUID..OFF_SUBSYSTEM]),
            subsystem: read_fixed_ascii(&buf[OFF_SUBSYSTEM..OFF_HDR_OFFSET]),
            hdr_offset,
            csum,
        })
    }

    /// Serialize to a 4096-byte buffer with `csum` zeroed — callers fill
    /// it in afterwards via [`compute_checksum`].
    pub fn write_unchecksummed(&self) -> [u8; BINARY_HEADER_SIZE] {
        let mut buf = [0u8; BINARY_HEADER_SIZE];
        let magic = match self.slot {
            HeaderSlot::Primary => MAGIC_PRIMARY,
            HeaderSlot::Secondary => MAGIC_SECONDARY,
        };
        buf[OFF_MAGIC..OFF_MAGIC + 6].copy_from_slice(&magic);
        buf[OFF_VERSION..OFF_VERSION + 2].copy_from_slice(&VERSION.to_be_bytes());
        buf[OFF_HDR_SIZE..OFF_HDR_SIZE + 8].copy_from_slice(&self.hdr_size.to_be_bytes());
        buf[OFF_SEQID..OFF_SEQID + 8].copy_from_slice(&self.seqid.to_be_bytes());
        write_fixed_ascii(&mut buf[OFF_LABEL..OFF_CSUM_ALG], &self.label).unwrap_or(());
        write_fixed_ascii(&mut buf[OFF_CSUM_ALG..OFF_SALT], &self.csum_alg).unwrap_or(());
        buf[OFF_SALT..OFF_SALT + SALT_SIZE].copy_from_slice(&self.salt);
        write_fixed_ascii(&mut buf[OFF_UUID..OFF_SUBSYSTEM], &self.uuid).unwrap_or(());
        write_fixed_ascii(&mut buf[OFF_SUBSYSTEM..OFF_HDR_OFFSET], &self.subsystem).unwrap_or(());
        buf[OFF_HDR_OFFSET..OFF_HDR_OFFSET + 8].copy_from_slice(&self.hdr_offset.to_be_bytes());
        // OFF_CSUM..OFF_CSUM+CSUM_SIZE stays zero.
        buf
    }

    /// Serialize to a 4096-byte buffer with `csum` filled in from
    /// `self.csum`.
    pub fn write(&self) -> [u8; BINARY_HEADER_SIZE] {
        let mut buf = self.write_unchecksummed();
        buf[OFF_CSUM..OFF_CSUM + CSUM_SIZE].copy_from_slice(&self.csum);
        buf
    }

    /// Byte offset of the secondary copy: by convention, immediately
    /// after the primary copy's `hdr_size` bytes.
    pub fn hdr_offset_of_secondary(&self) -> u64 {
        self.hdr_size
    }

    /// Checksum covers the 4096-byte binary header (with `csum` zeroed)
    /// followed by the JSON area, truncated/padded to `hdr_size - 4096`.
    /// Any `csum_alg` other than `"sha256"` is declared unsupported and
    /// rejected here rather than silently verified as if it were sha256.
    pub fn verify_checksum(&self, json_area: &[u8], raw_header: &[u8]) -> Result<()> {
        if self.csum_alg != "sha256" {
            return Err(Error::Unsupported(format!(
                "checksum algorithm {:?}",
                self.csum_alg
            )));
        }
        let expected = compute_checksum(raw_header, json_area)?;
        if expected[..self.csum.len().min(expected.len())] != self.csum[..expected.len().min(self.csum.len())] {
            return Err(Error::HeaderReadFailed);
        }
        Ok(())
    }
}

/// `sha256(header-with-csum-zeroed || json)`, zero-extended/truncated to
/// `CSUM_SIZE` bytes the way the on-disk `csum` field is sized.
pub fn compute_checksum(raw_header: &[u8], json_area: &[u8]) -> Result<[u8; CSUM_SIZE]> {
    if raw_header.len() < BINARY_HEADER_SIZE {
        return Err(Error::BufferTooSmall);
    }
    let mut zeroed = raw_header[..BINARY_HEADER_SIZE].to_vec();
    zeroed[OFF_CSUM..OFF_CSUM + CSUM_SIZE].fill(0);

    let mut hasher = Sha256::new();
    hasher.update(&zeroed);
    hasher.update(json_area);
    let digest = hasher.finalize();

    let mut out = [0u8; CSUM_SIZE];
    out[..digest.len()].copy_from_slice(&digest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(slot: HeaderSlot, seqid: u64) -> Luks2BinaryHeader {
        Luks2BinaryHeader {
            slot,
            hdr_size: DEFAULT_SECONDARY_OFFSET,
            seqid,
            label: "".to_string(),
            csum_alg: "sha256".to_string(),
            salt: [0x55; SALT_SIZE],
            uuid: "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee".to_string(),
            subsystem: "".to_string(),
            hdr_offset: match slot {
                HeaderSlot::Primary => 0,
                HeaderSlot::Secondary => DEFAULT_SECONDARY_OFFSET,
            },
            csum: [0u8; CSUM_SIZE],
        }
    }

    #[test]
    fn write_then_parse_round_trips_fields() {
        let header = sample(HeaderSlot::Primary, 7);
        let buf = header.write_unchecksummed();
        let parsed = Luks2BinaryHeader::parse(HeaderSlot::Primary, &buf).unwrap();
        assert_eq!(parsed.seqid, 7);
        assert_eq!(parsed.csum_alg, "sha256");
        assert_eq!(parsed.uuid, header.uuid);
    }

    #[test]
    fn secondary_slot_requires_reversed_magic() {
        let header = sample(HeaderSlot::Secondary, 1);
        let buf = header.write_unchecksummed();
        assert!(Luks2BinaryHeader::parse(HeaderSlot::Primary, &buf).is_err());
        assert!(Luks2BinaryHeader::parse(HeaderSlot::Secondary, &buf).is_ok());
    }

    #[test]
    fn checksum_covers_json_area_and_zeroes_csum_field_first() {
        let header = sample(HeaderSlot::Primary, 1);
        let raw = header.write_unchecksummed();
        let json_a = b"{}";
        let json_b = b"{\"x\":1}";
        let csum_a = compute_checksum(&raw, json_a).unwrap();
        let csum_b = compute_checksum(&raw, json_b).unwrap();
        assert_ne!(csum_a, csum_b);
    }

    #[test]
    fn verify_checksum_detects_tampering() {
        let mut header = sample(HeaderSlot::Primary, 1);
        let raw = header.write_unchecksummed();
        let json = b"{}";
        header.csum = compute_checksum(&raw, json).unwrap();
        assert!(header.verify_checksum(json, &raw).is_ok());
        assert!(header.verify_checksum(b"{\"tampered\":true}", &raw).is_err());
    }

    #[test]
    fn verify_checksum_rejects_unsupported_algorithm() {
        let mut header = sample(HeaderSlot::Primary, 1);
        header.csum_alg = "sha512".to_string();
        let raw = header.write_unchecksummed();
        let json = b"{}";
        header.csum = compute_checksum(&raw, json).unwrap();
        assert!(matches!(
            header.verify_checksum(json, &raw),
            Err(Error::Unsupported(_))
        ));
    }
}
