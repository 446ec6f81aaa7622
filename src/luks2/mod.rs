//! C4: the LUKS2 on-disk format — a redundant pair of binary header +
//! JSON metadata copies, plus a keyslots area holding each slot's raw
//! AF-split key material at the byte offset its `area` object names.

pub mod header;
pub mod json;
pub mod update;

pub use header::{
    HeaderSlot, Luks2BinaryHeader, BINARY_HEADER_SIZE, DEFAULT_JSON_AREA_SIZE,
    DEFAULT_SECONDARY_OFFSET, VERSION,
};
pub use json::{
    decode_b64, encode_b64, Af2, Area2, Config2, Digest2, Kdf2, Keyslot2, Luks2Metadata, Segment2,
    SegmentIntegrity2,
};
pub use update::{read_metadata, write_metadata};

use crate::device::BlockDevice;
use crate::error::{Error, Result};

/// Byte offset the keyslots area begins at, with the default 16 KiB ×2
/// header-pair layout.
pub const DEFAULT_KEYSLOTS_AREA_OFFSET: u64 = 2 * DEFAULT_SECONDARY_OFFSET;

/// Size of the keyslots area when the metadata area is the default 16
/// MiB total (two 16 KiB header copies plus this).
pub const DEFAULT_KEYSLOTS_AREA_SIZE: u64 = 16 * 1024 * 1024 - DEFAULT_KEYSLOTS_AREA_OFFSET;

/// Byte offset the encrypted payload segment begins at, with the default
/// layout (immediately after the keyslots area).
pub const DEFAULT_PAYLOAD_OFFSET: u64 = DEFAULT_KEYSLOTS_AREA_OFFSET + DEFAULT_KEYSLOTS_AREA_SIZE;

pub(crate) fn parse_decimal(field: &str) -> Result<u64> {
    field
        .parse()
        .map_err(|_| Error::BadParameter("non-decimal offset/size field"))
}

/// Read a keyslot's raw (still AF-split, still passphrase-wrapped) key
/// material from its `area` object.
pub fn read_keyslot_area(dev: &mut dyn BlockDevice, area: &Area2) -> Result<Vec<u8>> {
    let offset = parse_decimal(&area.offset)?;
    let size = parse_decimal(&area.size)? as usize;
    let block_size = dev.block_size();
    let nblocks = (size + block_size - 1) / block_size;
    if offset % block_size as u64 != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let mut buf = vec![0u8; nblocks * block_size];
    dev.get(offset / block_size as u64, &mut buf, nblocks)?;
    buf.truncate(size);
    Ok(buf)
}

/// Write a keyslot's raw key material into its `area`, padding the final
/// block with zeros.
pub fn write_keyslot_area(dev: &mut dyn BlockDevice, area: &Area2, material: &[u8]) -> Result<()> {
    let offset = parse_decimal(&area.offset)?;
    let size = parse_decimal(&area.size)? as usize;
    if material.len() > size {
        return Err(Error::KeyMaterialWriteFailed);
    }
    let block_size = dev.block_size();
    if offset % block_size as u64 != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let nblocks = (size + block_size - 1) / block_size;
    let mut buf = vec![0u8; nblocks * block_size];
    buf[..material.len()].copy_from_slice(material);
    dev.put(offset / block_size as u64, &buf, nblocks)?;
    dev.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemBlockDevice;

    #[test]
    fn default_layout_constants_are_consistent() {
        assert_eq!(DEFAULT_KEYSLOTS_AREA_OFFSET, 32 * 1024);
        assert_eq!(DEFAULT_KEYSLOTS_AREA_SIZE, 16_744_448);
        assert_eq!(DEFAULT_PAYLOAD_OFFSET, 16 * 1024 * 1024);
    }

    #[test]
    fn keyslot_area_round_trips_through_a_device() {
        let mut dev = MemBlockDevice::new(4 * 1024 * 1024);
        let area = Area2 {
            kind: "raw".to_string(),
            offset: "32768".to_string(),
            size: "4096".to_string(),
            encryption: "aes-xts-plain64".to_string(),
            key_size: 32,
        };
        let material: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        write_keyslot_area(&mut dev, &area, &material).unwrap();
        let read_back = read_keyslot_area(&mut dev, &area).unwrap();
        assert_eq!(read_back, material);
    }

    #[test]
    fn rejects_non_decimal_offset() {
        let mut dev = MemBlockDevice::new(4096);
        let area = Area2 {
            kind: "raw".to_string(),
            offset: "not-a-number".to_string(),
            size: "512".to_string(),
            encryption: "aes-xts-plain64".to_string(),
            key_size: 32,
        };
        assert!(read_keyslot_area(&mut dev, &area).is_err());
    }
}
