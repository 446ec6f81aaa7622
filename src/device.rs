//! §6 / §11.2: the block-device abstraction the core consumes.
//!
//! `spec.md` places the real block-device layer (loopback attachment,
//! device discovery) out of scope and treats it as an "external
//! collaborator". This module defines the trait shape that collaborator
//! must satisfy — lifted from `vic_blockdev_t` in `vic.h` — and ships one
//! reference implementation (`FileBlockDevice`, over a regular file or
//! block special file) plus an in-memory one used only by the test suite.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default, and minimum, block size this core operates in.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// The abstraction every LUKS header/keyslot read or write goes through.
/// Mirrors `vic_blockdev_t`'s vtable: path, block size, byte size, and
/// block-addressed get/put.
pub trait BlockDevice {
    /// Path this device was opened from (best-effort; used only for
    /// diagnostics).
    fn path(&self) -> &Path;

    /// Current block size in bytes.
    fn block_size(&self) -> usize;

    /// Change the block size used for subsequent `get`/`put` addressing.
    /// Returns `Error::BadBlockSize` unless `block_size` evenly divides
    /// (or is a multiple of) the underlying 512-byte sector size.
    fn set_block_size(&mut self, block_size: usize) -> Result<()>;

    /// Total device size in bytes.
    fn byte_size(&self) -> Result<u64>;

    /// Read `nblocks` blocks starting at `blkno` into `buf`.
    /// `buf.len()` must equal `nblocks * block_size()`.
    fn get(&mut self, blkno: u64, buf: &mut [u8], nblocks: usize) -> Result<()>;

    /// Write `nblocks` blocks starting at `blkno` from `buf`.
    /// `buf.len()` must equal `nblocks * block_size()`.
    fn put(&mut self, blkno: u64, buf: &[u8], nblocks: usize) -> Result<()>;

    /// Flush any buffered writes to stable storage.
    fn flush(&mut self) -> Result<()>;
}

fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || DEFAULT_BLOCK_SIZE % block_size != 0 && block_size % DEFAULT_BLOCK_SIZE != 0
    {
        return Err(Error::BadBlockSize(block_size));
    }
    Ok(())
}

/// A `BlockDevice` backed by `std::fs::File`. Works transparently whether
/// the path names a regular file (including a loopback-backed one, per
/// §6) or a block special file — both are just byte-addressable to
/// `std::fs`.
pub struct FileBlockDevice {
    path: PathBuf,
    file: File,
    block_size: usize,
}

impl FileBlockDevice {
    /// Open `path` for reading and writing. Does not create the file;
    /// callers that need a fresh backing file should create it first
    /// (e.g. via `File::create` + `set_len`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            path,
            file,
            block_size: DEFAULT_BLOCK_SIZE,
        })
    }
}

impl BlockDevice for FileBlockDevice {
    fn path(&self) -> &Path {
        &self.path
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn set_block_size(&mut self, block_size: usize) -> Result<()> {
        validate_block_size(block_size)?;
        self.block_size = block_size;
        Ok(())
    }

    fn byte_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn get(&mut self, blkno: u64, buf: &mut [u8], nblocks: usize) -> Result<()> {
        if buf.len() != nblocks * self.block_size {
            return Err(Error::BufferTooSmall);
        }
        self.file
            .seek(SeekFrom::Start(blkno * self.block_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn put(&mut self, blkno: u64, buf: &[u8], nblocks: usize) -> Result<()> {
        if buf.len() != nblocks * self.block_size {
            return Err(Error::BufferTooSmall);
        }
        self.file
            .seek(SeekFrom::Start(blkno * self.block_size as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// An in-memory `BlockDevice`, used only by this crate's own test suite —
/// format/open round trips without touching the filesystem.
pub struct MemBlockDevice {
    path: PathBuf,
    data: Vec<u8>,
    block_size: usize,
}

impl MemBlockDevice {
    /// Create a zeroed device of `size_bytes` bytes.
    pub fn new(size_bytes: usize) -> Self {
        Self {
            path: PathBuf::from("memdev"),
            data: vec![0u8; size_bytes],
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl BlockDevice for MemBlockDevice {
    fn path(&self) -> &Path {
        &self.path
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn set_block_size(&mut self, block_size: usize) -> Result<()> {
        validate_block_size(block_size)?;
        self.block_size = block_size;
        Ok(())
    }

    fn byte_size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn get(&mut self, blkno: u64, buf: &mut [u8], nblocks: usize) -> Result<()> {
        let start = blkno as usize * self.block_size;
        let len = nblocks * self.block_size;
        if buf.len() != len {
            return Err(Error::BufferTooSmall);
        }
        if start + len > self.data.len() {
            return Err(Error::DeviceTooSmall);
        }
        buf.copy_from_slice(&self.data[start..start + len]);
        Ok(())
    }

    fn put(&mut self, blkno: u64, buf: &[u8], nblocks: usize) -> Result<()> {
        let start = blkno as usize * self.block_size;
        let len = nblocks * self.block_size;
        if buf.len() != len {
            return Err(Error::BufferTooSmall);
        }
        if start + len > self.data.len() {
            return Err(Error::DeviceTooSmall);
        }
        self.data[start..start + len].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_device_round_trips_a_block() {
        let mut dev = MemBlockDevice::new(4096);
        let payload = vec![0xAAu8; 512];
        dev.put(2, &payload, 1).unwrap();

        let mut readback = vec![0u8; 512];
        dev.get(2, &mut readback, 1).unwrap();
        assert_eq!(readback, payload);
    }

    #[test]
    fn mem_device_rejects_out_of_bounds_access() {
        let mut dev = MemBlockDevice::new(1024);
        let payload = vec![0u8; 512];
        assert!(dev.put(10, &payload, 1).is_err());
    }

    #[test]
    fn block_size_must_relate_to_512() {
        let mut dev = MemBlockDevice::new(4096);
        assert!(dev.set_block_size(4096).is_ok());
        assert!(dev.set_block_size(511).is_err());
    }
}
