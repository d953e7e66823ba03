//! File Control Blocks and the directories that hold them. See
//! `SPEC_FULL.md` §3/§4.4.
//!
//! Grounded on the teacher's `DirEntry` (`examples/rrbutani-fatfs/src/fat/dir.rs`):
//! a fixed-width name array with a constructor that silently truncates, and a
//! `from_arr`/`into_arr` pair for (de)serializing a fixed-size record. The
//! teacher splits the name into an 8.3 `FileName`/`FileExt` pair; this format
//! has a single 15-byte name field, so that split collapses into one.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, TfsError};

pub const NAME_LEN: usize = 15;
pub const FCB_LEN: usize = 24;

pub const ROOT_NAME: &str = "ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fcb {
    name: [u8; NAME_LEN],
    pub is_dir: bool,
    pub starting_block: u32,
    pub size_bytes: u32,
}

impl Fcb {
    /// Builds an FCB, truncating `name` to 15 UTF-8 bytes (spec §3: "names
    /// longer than 15 bytes are truncated"; shorter names are zero-padded).
    pub fn new(name: &str, is_dir: bool, starting_block: u32, size_bytes: u32) -> Self {
        let mut buf = [0u8; NAME_LEN];
        let bytes = name.as_bytes();
        let n = bytes.len().min(NAME_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);

        Self {
            name: buf,
            is_dir,
            starting_block,
            size_bytes,
        }
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn raw_name(&self) -> &[u8; NAME_LEN] {
        &self.name
    }

    pub fn matches(&self, name: &str, is_dir: bool) -> bool {
        self.is_dir == is_dir && self.name().eq_ignore_ascii_case(name)
    }

    pub fn is_root_self_entry(&self) -> bool {
        self.is_dir && self.name().eq_ignore_ascii_case(ROOT_NAME)
    }

    pub fn set_name(&mut self, name: &str) {
        *self = Self::new(name, self.is_dir, self.starting_block, self.size_bytes);
    }

    pub fn to_bytes(&self) -> [u8; FCB_LEN] {
        let mut buf = [0u8; FCB_LEN];
        buf[0..NAME_LEN].copy_from_slice(&self.name);
        buf[NAME_LEN] = self.is_dir as u8;
        BigEndian::write_u32(&mut buf[16..20], self.starting_block);
        BigEndian::write_u32(&mut buf[20..24], self.size_bytes);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FCB_LEN {
            return Err(TfsError::InvalidDirBytes(format!(
                "FCB record too short: got {} bytes, need {}",
                bytes.len(),
                FCB_LEN
            )));
        }

        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[0..NAME_LEN]);

        Ok(Self {
            name,
            is_dir: bytes[NAME_LEN] != 0,
            starting_block: BigEndian::read_u32(&bytes[16..20]),
            size_bytes: BigEndian::read_u32(&bytes[20..24]),
        })
    }
}

/// An ordered list of FCB records — the in-memory form of one directory's
/// contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<Fcb>,
}

impl Directory {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[Fcb] {
        &self.entries
    }

    pub fn byte_size(&self) -> u32 {
        (self.entries.len() * FCB_LEN) as u32
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.entries.len() * FCB_LEN);
        for entry in &self.entries {
            buf.extend_from_slice(&entry.to_bytes());
        }
        buf
    }

    /// `size` must be a non-negative multiple of `FCB_LEN`; otherwise fails
    /// `InvalidDirBytes` (spec §4.4).
    pub fn from_bytes(buf: &[u8], size: i64) -> Result<Self> {
        if size < 0 || size % FCB_LEN as i64 != 0 {
            return Err(TfsError::InvalidDirBytes(format!(
                "directory size {} is not a non-negative multiple of {}",
                size, FCB_LEN
            )));
        }

        let count = (size as usize) / FCB_LEN;
        if buf.len() < count * FCB_LEN {
            return Err(TfsError::InvalidDirBytes(format!(
                "buffer of {} bytes too short for {} entries",
                buf.len(),
                count
            )));
        }

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let start = i * FCB_LEN;
            entries.push(Fcb::from_bytes(&buf[start..start + FCB_LEN])?);
        }

        Ok(Self { entries })
    }

    pub fn find(&self, name: &str, is_dir: bool) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(name, is_dir))
    }

    pub fn get(&self, idx: usize) -> &Fcb {
        &self.entries[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Fcb {
        &mut self.entries[idx]
    }

    pub fn contains(&self, name: &str, is_dir: bool) -> bool {
        self.find(name, is_dir).is_some()
    }

    pub fn add(&mut self, entry: Fcb) -> Result<()> {
        if self.contains(&entry.name(), entry.is_dir) {
            return Err(TfsError::DuplicateEntry(entry.name()));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove_by_name(&mut self, name: &str, is_dir: bool) -> Result<Fcb> {
        match self.find(name, is_dir) {
            Some(idx) => Ok(self.entries.remove(idx)),
            None => Err(TfsError::NotFound(name.to_string())),
        }
    }

    pub fn update(&mut self, entry: Fcb) -> Result<()> {
        let idx = self
            .find(&entry.name(), entry.is_dir)
            .ok_or_else(|| TfsError::NotFound(entry.name()))?;
        self.entries[idx] = entry;
        Ok(())
    }

    pub fn update_name(&mut self, name: &str, is_dir: bool, new_name: &str) -> Result<()> {
        let idx = self
            .find(name, is_dir)
            .ok_or_else(|| TfsError::NotFound(name.to_string()))?;
        self.entries[idx].set_name(new_name);
        Ok(())
    }

    pub fn update_location(&mut self, name: &str, is_dir: bool, starting_block: u32) -> Result<()> {
        let idx = self
            .find(name, is_dir)
            .ok_or_else(|| TfsError::NotFound(name.to_string()))?;
        self.entries[idx].starting_block = starting_block;
        Ok(())
    }

    pub fn update_size(&mut self, name: &str, is_dir: bool, size_bytes: u32) -> Result<()> {
        let idx = self
            .find(name, is_dir)
            .ok_or_else(|| TfsError::NotFound(name.to_string()))?;
        self.entries[idx].size_bytes = size_bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_truncates_and_pads() {
        let fcb = Fcb::new("this-name-is-way-too-long", false, 1, 0);
        assert_eq!(fcb.name(), "this-name-is-wa");
        assert_eq!(fcb.raw_name()[1..], [0u8; NAME_LEN - 1]);
    }

    #[test]
    fn name_comparison_is_case_insensitive() {
        let fcb = Fcb::new("Hello", false, 1, 0);
        assert!(fcb.matches("hello", false));
        assert!(fcb.matches("HELLO", false));
        assert!(!fcb.matches("hello", true));
    }

    #[test]
    fn fcb_round_trips_through_bytes() {
        let fcb = Fcb::new("data", true, 42, 240);
        let bytes = fcb.to_bytes();
        assert_eq!(bytes.len(), FCB_LEN);
        let back = Fcb::from_bytes(&bytes).unwrap();
        assert_eq!(fcb, back);
    }

    #[test]
    fn directory_round_trips_through_bytes() {
        let mut dir = Directory::new();
        dir.add(Fcb::new("ROOT", true, 5, 24)).unwrap();
        dir.add(Fcb::new("a", true, 6, 0)).unwrap();
        dir.add(Fcb::new("f", false, 7, 100)).unwrap();

        let bytes = dir.to_bytes();
        let back = Directory::from_bytes(&bytes, dir.byte_size() as i64).unwrap();
        assert_eq!(dir, back);
    }

    #[test]
    fn from_bytes_rejects_bad_size() {
        assert!(matches!(
            Directory::from_bytes(&[], -1),
            Err(TfsError::InvalidDirBytes(_))
        ));
        assert!(matches!(
            Directory::from_bytes(&[0; 10], 10),
            Err(TfsError::InvalidDirBytes(_))
        ));
    }

    #[test]
    fn add_rejects_duplicates_by_name_and_kind() {
        let mut dir = Directory::new();
        dir.add(Fcb::new("x", false, 1, 0)).unwrap();
        assert!(matches!(
            dir.add(Fcb::new("X", false, 2, 0)),
            Err(TfsError::DuplicateEntry(_))
        ));
        // Same name, different kind, is not a duplicate.
        dir.add(Fcb::new("x", true, 3, 0)).unwrap();
    }

    #[test]
    fn remove_missing_fails_not_found() {
        let mut dir = Directory::new();
        assert!(matches!(
            dir.remove_by_name("nope", false),
            Err(TfsError::NotFound(_))
        ));
    }
}
