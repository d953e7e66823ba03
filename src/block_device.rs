//! A primitive block device backed by a single host file.
//!
//! The container file is preallocated to `total_bytes` at `create` time and is
//! read/written in whole, block-indexed chunks from then on. There is no
//! sub-block addressing: every read or write goes through [`read_block`] /
//! [`write_block`], exactly as spec'd (see `SPEC_FULL.md` §4.1).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, TfsError};

#[derive(Debug)]
pub struct BlockDevice {
    file: File,
    block_size: u32,
    num_blocks: u32,
}

impl BlockDevice {
    /// Replaces any existing container at `path` and preallocates it to
    /// `total_bytes`.
    pub fn create<P: AsRef<Path>>(path: P, total_bytes: u64, block_size: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_bytes)?;

        Ok(Self {
            file,
            block_size,
            num_blocks: (total_bytes / block_size as u64) as u32,
        })
    }

    /// Opens a container that is expected to already exist, asserting its
    /// size against `total_bytes`.
    pub fn open<P: AsRef<Path>>(path: P, total_bytes: u64, block_size: u32) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        file.set_len(total_bytes)?;

        Ok(Self {
            file,
            block_size,
            num_blocks: (total_bytes / block_size as u64) as u32,
        })
    }

    /// Opens a container whose size is derived from the file's current
    /// length rather than an explicit `total_bytes`.
    pub fn open_existing<P: AsRef<Path>>(path: P, block_size: u32) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            block_size,
            num_blocks: (len / block_size as u64) as u32,
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn get_block_count(&self) -> u32 {
        self.num_blocks
    }

    fn check_bounds(&self, index: u32) -> Result<()> {
        if (index as u64) >= self.num_blocks as u64 {
            return Err(TfsError::IoBounds {
                index: index as i64,
                bound: self.num_blocks as i64,
            });
        }
        Ok(())
    }

    /// Fills `buf[..block_size]` with the contents of block `index`. `buf`
    /// must be at least `block_size` bytes.
    pub fn read_block(&mut self, index: u32, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(index)?;
        let bs = self.block_size as u64;
        self.file.seek(SeekFrom::Start(index as u64 * bs))?;
        self.file.read_exact(&mut buf[..self.block_size as usize])?;
        Ok(())
    }

    /// Writes up to `block_size` bytes from `buf` to block `index`,
    /// zero-padding the remainder of the block if `buf` is shorter.
    pub fn write_block(&mut self, index: u32, buf: &[u8]) -> Result<()> {
        self.check_bounds(index)?;
        let bs = self.block_size as usize;
        if buf.len() > bs {
            return Err(TfsError::InvalidWrite(format!(
                "buffer of {} bytes exceeds block size {}",
                buf.len(),
                bs
            )));
        }

        let mut padded = vec![0u8; bs];
        padded[..buf.len()].copy_from_slice(buf);

        self.file
            .seek(SeekFrom::Start(index as u64 * self.block_size as u64))?;
        self.file.write_all(&padded)?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        drop(self.file);
        Ok(())
    }
}
