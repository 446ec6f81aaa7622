//! C3: the LUKS1 on-disk format — a single fixed 592-byte binary header
//! followed by 8 inline keyslot records, each pointing at its own AF-split
//! key-material area further out on the device.
//!
//! This module only does header/key-material I/O and layout validation.
//! Passphrase stretching, AF split/merge, and master-key recovery live in
//! [`crate::keyslot_pipeline`], which is shared with LUKS2.

pub mod header;
pub mod keyslot;

pub use header::{Luks1Header, HEADER_SIZE, MAGIC, VERSION};
pub use keyslot::{Keyslot1, KeyslotState, KEYSLOT1_SIZE, NUM_KEYSLOTS};

use crate::device::BlockDevice;
use crate::error::{Error, Result};

/// Round `n` up to the given block size.
fn blocks_for(nbytes: usize, block_size: usize) -> usize {
    (nbytes + block_size - 1) / block_size
}

/// Read and parse the binary header from sector 0.
pub fn read_header(dev: &mut dyn BlockDevice) -> Result<Luks1Header> {
    let block_size = dev.block_size();
    let nblocks = blocks_for(HEADER_SIZE, block_size);
    let mut buf = vec![0u8; nblocks * block_size];
    dev.get(0, &mut buf, nblocks)?;
    Luks1Header::parse(&buf)
}

/// Serialize and write the binary header to sector 0, padding the rest of
/// the final block with zeros.
pub fn write_header(dev: &mut dyn BlockDevice, header: &Luks1Header) -> Result<()> {
    let block_size = dev.block_size();
    let nblocks = blocks_for(HEADER_SIZE, block_size);
    let mut buf = vec![0u8; nblocks * block_size];
    let encoded = header.write()?;
    buf[..HEADER_SIZE].copy_from_slice(&encoded);
    dev.put(0, &buf, nblocks)?;
    dev.flush()
}

/// Read the raw (still AF-split, still passphrase-encrypted) key material
/// for `slot` — `slot.stripes * key_bytes` bytes rounded up to the
/// device's block size, starting at the slot's sector offset. Callers
/// that need the exact unpadded length (e.g. after decrypting) truncate
/// themselves; this function never discards bytes a writer put there.
pub fn read_key_material(
    dev: &mut dyn BlockDevice,
    slot: &Keyslot1,
    key_bytes: usize,
) -> Result<Vec<u8>> {
    let block_size = dev.block_size();
    let byte_offset = slot.key_material_offset_sectors as u64 * 512;
    if byte_offset % block_size as u64 != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let blkno = byte_offset / block_size as u64;
    let nbytes = slot.stripes as usize * key_bytes;
    let nblocks = blocks_for(nbytes, block_size);
    let mut buf = vec![0u8; nblocks * block_size];
    dev.get(blkno, &mut buf, nblocks)?;
    Ok(buf)
}

/// Write AF-split key material for `slot`, padding the final block with
/// zeros.
pub fn write_key_material(
    dev: &mut dyn BlockDevice,
    slot: &Keyslot1,
    material: &[u8],
) -> Result<()> {
    let block_size = dev.block_size();
    let byte_offset = slot.key_material_offset_sectors as u64 * 512;
    if byte_offset % block_size as u64 != 0 {
        return Err(Error::BadBlockSize(block_size));
    }
    let blkno = byte_offset / block_size as u64;
    let nblocks = blocks_for(material.len(), block_size);
    let mut buf = vec![0u8; nblocks * block_size];
    buf[..material.len()].copy_from_slice(material);
    dev.put(blkno, &buf, nblocks)?;
    dev.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemBlockDevice;

    fn sample_header() -> Luks1Header {
        let keyslots: Vec<Keyslot1> = (0..NUM_KEYSLOTS)
            .map(|i| Keyslot1 {
                active: i == 0,
                iterations: if i == 0 { 10_000 } else { 0 },
                salt: [i as u8; 32],
                key_material_offset_sectors: 8 + (i as u32) * 512,
                stripes: 4000,
            })
            .collect();

        Luks1Header {
            cipher_name: "aes".into(),
            cipher_mode: "cbc-essiv:sha256".into(),
            hash_spec: "sha256".into(),
            payload_offset_sectors: 1 << 20,
            key_bytes: 32,
            mk_digest: [0x33; 20],
            mk_digest_salt: [0x44; 32],
            mk_digest_iter: 20_000,
            uuid: "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee".into(),
            keyslots: keyslots.try_into().unwrap(),
        }
    }

    #[test]
    fn header_round_trips_through_a_device() {
        let mut dev = MemBlockDevice::new(16 * 1024 * 1024);
        let header = sample_header();
        write_header(&mut dev, &header).unwrap();
        let read_back = read_header(&mut dev).unwrap();
        assert_eq!(read_back.cipher_name, "aes");
        assert_eq!(read_back.uuid, header.uuid);
        assert_eq!(read_back.find_filled_slots(), vec![0]);
    }

    #[test]
    fn key_material_round_trips_through_a_device() {
        let mut dev = MemBlockDevice::new(16 * 1024 * 1024);
        let header = sample_header();
        let slot = &header.keyslots[0];
        let material: Vec<u8> = (0..slot.stripes as usize * 32)
            .map(|i| (i % 256) as u8)
            .collect();
        write_key_material(&mut dev, slot, &material).unwrap();
        let read_back = read_key_material(&mut dev, slot, 32).unwrap();
        assert_eq!(read_back, material);
    }
}
