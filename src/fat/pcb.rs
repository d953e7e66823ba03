//! The Partition Control Block: the 16-byte header plus the FAT it owns.
//! See `SPEC_FULL.md` §3/§4.3.
//!
//! The fixed-offset decode follows the teacher's `e!` macro idiom in
//! `examples/rrbutani-fatfs/src/fat/boot_sector.rs` (`BiosParameterBlock::read`),
//! but encodes/decodes explicitly big-endian via `byteorder` rather than
//! relying on platform-default byte order, and completes the `write` side the
//! teacher left as `todo!()`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, TfsError};
use crate::fat::table::Fat;
use crate::util::ceil_div;

/// Size in bytes of the PCB header (four `i32` fields), before the FAT.
pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Pcb {
    pub block_size: u32,
    pub num_blocks: u32,
    pub first_free_block: u32,
    pub root_dir_block: u32,
    pub fat: Fat,
}

impl Pcb {
    /// `ceil((16 + 4*num_blocks) / block_size)`, i.e. the number of blocks
    /// the PCB + FAT occupy starting at block 0.
    pub fn pcb_blocks(num_blocks: u32, block_size: u32) -> u32 {
        ceil_div(HEADER_LEN as u32 + 4 * num_blocks, block_size)
    }

    /// Serializes the header + FAT into a contiguous buffer, padded with
    /// zeros to a multiple of `block_size`.
    pub fn encode(&self) -> Vec<u8> {
        let raw_len = HEADER_LEN + 4 * self.fat.len();
        let padded_len = (Self::pcb_blocks(self.num_blocks, self.block_size) as usize)
            * self.block_size as usize;

        let mut buf = vec![0u8; padded_len.max(raw_len)];
        BigEndian::write_u32(&mut buf[0..4], self.block_size);
        BigEndian::write_u32(&mut buf[4..8], self.num_blocks);
        BigEndian::write_u32(&mut buf[8..12], self.first_free_block);
        BigEndian::write_u32(&mut buf[12..16], self.root_dir_block);

        for (i, &entry) in self.fat.entries().iter().enumerate() {
            let off = HEADER_LEN + 4 * i;
            BigEndian::write_i32(&mut buf[off..off + 4], entry);
        }

        buf
    }

    /// Reconstructs a `Pcb` from the raw header+FAT bytes read off disk.
    /// `block_size`/`num_blocks` are taken from the mount-time arguments, not
    /// from the on-disk header (spec §4.3: "the first 8 bytes... are
    /// discarded in favor of the mount-time arguments").
    pub fn decode(bytes: &[u8], block_size: u32, num_blocks: u32) -> Result<Self> {
        let needed = HEADER_LEN + 4 * num_blocks as usize;
        if bytes.len() < needed {
            return Err(TfsError::InvalidDirBytes(format!(
                "PCB buffer too short: got {} bytes, need {}",
                bytes.len(),
                needed
            )));
        }

        let first_free_block = BigEndian::read_u32(&bytes[8..12]);
        let root_dir_block = BigEndian::read_u32(&bytes[12..16]);

        let pcb_end = Self::pcb_blocks(num_blocks, block_size).saturating_sub(1);
        let mut entries = Vec::with_capacity(num_blocks as usize);
        for i in 0..num_blocks as usize {
            let off = HEADER_LEN + 4 * i;
            entries.push(BigEndian::read_i32(&bytes[off..off + 4]));
        }

        Ok(Self {
            block_size,
            num_blocks,
            first_free_block,
            root_dir_block,
            fat: Fat::from_entries(entries, pcb_end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcb_blocks_matches_formula() {
        // N = 511, B = 128 -> ceil((16 + 4*511)/128) = ceil(2060/128) = 17
        assert_eq!(Pcb::pcb_blocks(511, 128), 17);
    }

    #[test]
    fn encode_decode_round_trip() {
        let n = 32u32;
        let pcb_end = Pcb::pcb_blocks(n, 64) - 1;
        let mut fat = Fat::new(n, pcb_end);
        for i in 0..pcb_end {
            fat.set(i, i as i32 + 1).unwrap();
        }
        fat.set(pcb_end, -1).unwrap();
        fat.set(pcb_end + 1, -1).unwrap();

        let pcb = Pcb {
            block_size: 64,
            num_blocks: n,
            first_free_block: pcb_end + 2,
            root_dir_block: pcb_end + 1,
            fat,
        };

        let encoded = pcb.encode();
        let decoded = Pcb::decode(&encoded, 64, n).unwrap();

        assert_eq!(decoded.first_free_block, pcb.first_free_block);
        assert_eq!(decoded.root_dir_block, pcb.root_dir_block);
        assert_eq!(decoded.fat.entries(), pcb.fat.entries());
    }
}
