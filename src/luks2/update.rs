//! C4: reading the header pair with seqid-based selection, and the
//! two-phase crash-safe write protocol — secondary copy first, then
//! primary, each flushed before the next write begins.

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::luks2::header::{
    compute_checksum, HeaderSlot, Luks2BinaryHeader, BINARY_HEADER_SIZE,
    DEFAULT_JSON_AREA_SIZE, DEFAULT_SECONDARY_OFFSET,
};
use crate::luks2::json::Luks2Metadata;

fn read_region(dev: &mut dyn BlockDevice, byte_offset: u64, len: usize) -> Result<Vec<u8>> {
    let block_size = dev.block_size();
    if byte_offset % block_size as u64 != 0 || len % block_size != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let blkno = byte_offset / block_size as u64;
    let nblocks = len / block_size;
    let mut buf = vec![0u8; len];
    dev.get(blkno, &mut buf, nblocks)?;
    Ok(buf)
}

fn write_region(dev: &mut dyn BlockDevice, byte_offset: u64, data: &[u8]) -> Result<()> {
    let block_size = dev.block_size();
    if byte_offset % block_size as u64 != 0 || data.len() % block_size != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let blkno = byte_offset / block_size as u64;
    let nblocks = data.len() / block_size;
    dev.put(blkno, data, nblocks)
}

/// One successfully read-and-verified copy of the header pair.
struct Candidate {
    header: Luks2BinaryHeader,
    metadata: Luks2Metadata,
}

fn try_read_copy(
    dev: &mut dyn BlockDevice,
    slot: HeaderSlot,
    byte_offset: u64,
) -> Option<Candidate> {
    let raw = read_region(dev, byte_offset, BINARY_HEADER_SIZE).ok()?;
    let header = Luks2BinaryHeader::parse(slot, &raw).ok()?;
    let json_size = header.hdr_size.checked_sub(BINARY_HEADER_SIZE as u64)?;
    let json_area = read_region(dev, byte_offset + BINARY_HEADER_SIZE as u64, json_size as usize).ok()?;
    header.verify_checksum(&json_area, &raw).ok()?;
    let metadata = Luks2Metadata::parse(&json_area).ok()?;
    Some(Candidate { header, metadata })
}

/// Read both header copies and pick the valid one with the higher
/// `seqid`, per §4.4: a copy that fails checksum verification is treated
/// as absent, not fatal, as long as the other copy is valid.
pub fn read_metadata(dev: &mut dyn BlockDevice) -> Result<(Luks2BinaryHeader, Luks2Metadata)> {
    let primary = try_read_copy(dev, HeaderSlot::Primary, 0);
    let secondary_offset = primary
        .as_ref()
        .map(|c| c.header.hdr_offset_of_secondary())
        .unwrap_or(DEFAULT_SECONDARY_OFFSET);
    let secondary = try_read_copy(dev, HeaderSlot::Secondary, secondary_offset);

    match (primary, secondary) {
        (Some(p), Some(s)) if p.header.seqid >= s.header.seqid => Ok((p.header, p.metadata)),
        (Some(_), Some(s)) => Ok((s.header, s.metadata)),
        (Some(p), None) => Ok((p.header, p.metadata)),
        (None, Some(s)) => Ok((s.header, s.metadata)),
        (None, None) => Err(Error::HeaderReadFailed),
    }
}

/// Write a new header pair with seqid `current_seqid + 1`: secondary
/// copy first (flushed), then primary (flushed). A crash between the two
/// writes leaves the previously-valid copy with the old seqid selectable
/// on next open, and the freshly-written copy either matches it (if the
/// crash was after the fsync) or fails checksum (if not) — never a torn
/// read.
pub fn write_metadata(
    dev: &mut dyn BlockDevice,
    current_seqid: u64,
    hdr_size: u64,
    secondary_offset: u64,
    uuid: &str,
    metadata: &Luks2Metadata,
) -> Result<()> {
    let json_size = hdr_size
        .checked_sub(BINARY_HEADER_SIZE as u64)
        .ok_or(Error::BadParameter("hdr_size smaller than binary header"))? as usize;
    let mut json_bytes = metadata.to_canonical_json()?;
    if json_bytes.len() > json_size {
        return Err(Error::HeaderWriteFailed);
    }
    json_bytes.resize(json_size, 0);

    let new_seqid = current_seqid + 1;

    let write_copy = |dev: &mut dyn BlockDevice, slot: HeaderSlot, offset: u64| -> Result<()> {
        let mut header = Luks2BinaryHeader {
            slot,
            hdr_size,
            seqid: new_seqid,
            label: String::new(),
            csum_alg: "sha256".to_string(),
            salt: {
                let mut salt = [0u8; 64];
                crate::primitives::rng::random(&mut salt);
                salt
            },
            uuid: uuid.to_string(),
            subsystem: String::new(),
            hdr_offset: offset,
            csum: [0u8; 64],
        };
        let unchecksummed = header.write_unchecksummed();
        header.csum = compute_checksum(&unchecksummed, &json_bytes)?;
        let raw = header.write();

        write_region(dev, offset, &raw)?;
        write_region(dev, offset + BINARY_HEADER_SIZE as u64, &json_bytes)?;
        dev.flush()
    };

    write_copy(dev, HeaderSlot::Secondary, secondary_offset)?;
    write_copy(dev, HeaderSlot::Primary, 0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemBlockDevice;
    use crate::luks2::json::{Af2, Area2, Config2, Digest2, Kdf2, Keyslot2, Segment2};
    use std::collections::BTreeMap;

    fn sample_metadata() -> Luks2Metadata {
        let mut keyslots = BTreeMap::new();
        keyslots.insert(
            "0".to_string(),
            Keyslot2 {
                kind: "luks2".to_string(),
                key_size: 32,
                af: Af2 {
                    kind: "luks1".to_string(),
                    stripes: 4000,
                    hash: "sha256".to_string(),
                },
                area: Area2 {
                    kind: "raw".to_string(),
                    offset: "32768".to_string(),
                    size: "131072".to_string(),
                    encryption: "aes-xts-plain64".to_string(),
                    key_size: 32,
                },
                kdf: Kdf2::Pbkdf2 {
                    hash: "sha256".to_string(),
                    iterations: 100_000,
                    salt: crate::luks2::json::encode_b64(&[0x10; 32]),
                },
            },
        );
        let mut segments = BTreeMap::new();
        segments.insert(
            "0".to_string(),
            Segment2 {
                kind: "crypt".to_string(),
                offset: "2097152".to_string(),
                size: "dynamic".to_string(),
                iv_tweak: "0".to_string(),
                encryption: "aes-xts-plain64".to_string(),
                sector_size: 512,
                integrity: None,
            },
        );
        let mut digests = BTreeMap::new();
        digests.insert(
            "0".to_string(),
            Digest2 {
                kind: "pbkdf2".to_string(),
                keyslots: vec!["0".to_string()],
                segments: vec!["0".to_string()],
                digest: crate::luks2::json::encode_b64(&[0x20; 32]),
                salt: crate::luks2::json::encode_b64(&[0x30; 32]),
                hash: "sha256".to_string(),
                iterations: 100_000,
            },
        );
        Luks2Metadata {
            keyslots,
            tokens: BTreeMap::new(),
            segments,
            digests,
            config: Config2 {
                json_size: DEFAULT_JSON_AREA_SIZE.to_string(),
                keyslots_size: "16744448".to_string(),
            },
        }
    }

    #[test]
    fn write_then_read_selects_the_just_written_copy() {
        let mut dev = MemBlockDevice::new(4 * 1024 * 1024);
        let metadata = sample_metadata();
        write_metadata(&mut dev, 0, DEFAULT_SECONDARY_OFFSET, DEFAULT_SECONDARY_OFFSET, "uuid-1", &metadata).unwrap();

        let (header, read_back) = read_metadata(&mut dev).unwrap();
        assert_eq!(header.seqid, 1);
        assert_eq!(read_back, metadata);
    }

    #[test]
    fn second_write_bumps_seqid_and_both_copies_agree() {
        let mut dev = MemBlockDevice::new(4 * 1024 * 1024);
        let metadata = sample_metadata();
        write_metadata(&mut dev, 0, DEFAULT_SECONDARY_OFFSET, DEFAULT_SECONDARY_OFFSET, "uuid-1", &metadata).unwrap();
        write_metadata(&mut dev, 1, DEFAULT_SECONDARY_OFFSET, DEFAULT_SECONDARY_OFFSET, "uuid-1", &metadata).unwrap();

        let (header, _) = read_metadata(&mut dev).unwrap();
        assert_eq!(header.seqid, 2);
    }

    #[test]
    fn corrupt_primary_falls_back_to_secondary() {
        let mut dev = MemBlockDevice::new(4 * 1024 * 1024);
        let metadata = sample_metadata();
        write_metadata(&mut dev, 0, DEFAULT_SECONDARY_OFFSET, DEFAULT_SECONDARY_OFFSET, "uuid-1", &metadata).unwrap();

        let mut garbage = vec![0u8; 512];
        crate::primitives::rng::random(&mut garbage);
        dev.put(0, &garbage, 1).unwrap();

        let (header, read_back) = read_metadata(&mut dev).unwrap();
        assert_eq!(header.slot, crate::luks2::header::HeaderSlot::Secondary);
        assert_eq!(read_back, metadata);
    }

    #[test]
    fn both_copies_missing_is_a_hard_failure() {
        let mut dev = MemBlockDevice::new(4 * 1024 * 1024);
        assert!(matches!(read_metadata(&mut dev), Err(Error::HeaderReadFailed)));
    }
}
