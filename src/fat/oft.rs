//! The in-memory Open File Table: a fixed-capacity slot array mapping handle
//! ids to an FCB snapshot plus a cursor offset. See `SPEC_FULL.md` §4.5.
//!
//! Grounded on the *shape* of the teacher's `CacheEntry` slot array
//! (`examples/rrbutani-fatfs/src/fat/cache.rs`): a `Vec<Option<T>>` addressed by
//! index, first-empty-slot allocation, no eviction policy (this table has no
//! need for one — entries are removed explicitly on close/rm).

use crate::error::{Result, TfsError};
use crate::fat::dir::Fcb;

#[derive(Debug, Clone)]
struct Slot {
    fcb: Fcb,
    offset: u32,
}

#[derive(Debug)]
pub struct OpenFileTable {
    slots: Vec<Option<Slot>>,
}

impl OpenFileTable {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: vec![None; capacity as usize],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn check_handle(&self, handle: i64) -> Result<usize> {
        if handle < 0 || handle as usize >= self.slots.len() {
            return Err(TfsError::BadHandle(handle));
        }
        if self.slots[handle as usize].is_none() {
            return Err(TfsError::BadHandle(handle));
        }
        Ok(handle as usize)
    }

    /// Installs a new entry in the first empty slot. Fails `OutOfSpace` if
    /// the table is full.
    pub fn add(&mut self, fcb: Fcb, offset: u32) -> Result<i64> {
        if offset > fcb.size_bytes {
            return Err(TfsError::BadHandle(offset as i64));
        }

        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(TfsError::OutOfSpace {
                needed: 1,
                available: 0,
            })?;

        self.slots[idx] = Some(Slot { fcb, offset });
        Ok(idx as i64)
    }

    pub fn remove(&mut self, handle: i64) -> Result<()> {
        let idx = self.check_handle(handle)?;
        self.slots[idx] = None;
        Ok(())
    }

    /// Scans for a slot whose FCB matches by (name, is_dir, starting_block).
    pub fn lookup_handle(&self, fcb: &Fcb) -> Option<i64> {
        self.slots
            .iter()
            .position(|s| match s {
                Some(slot) => {
                    slot.fcb.name() == fcb.name()
                        && slot.fcb.is_dir == fcb.is_dir
                        && slot.fcb.starting_block == fcb.starting_block
                }
                None => false,
            })
            .map(|i| i as i64)
    }

    pub fn get_fcb(&self, handle: i64) -> Result<&Fcb> {
        let idx = self.check_handle(handle)?;
        Ok(&self.slots[idx].as_ref().unwrap().fcb)
    }

    pub fn get_offset(&self, handle: i64) -> Result<u32> {
        let idx = self.check_handle(handle)?;
        Ok(self.slots[idx].as_ref().unwrap().offset)
    }

    pub fn update_offset(&mut self, handle: i64, offset: u32) -> Result<()> {
        let idx = self.check_handle(handle)?;
        let slot = self.slots[idx].as_mut().unwrap();
        if offset > slot.fcb.size_bytes {
            return Err(TfsError::BadHandle(offset as i64));
        }
        slot.offset = offset;
        Ok(())
    }

    pub fn update_fcb(&mut self, handle: i64, fcb: Fcb) -> Result<()> {
        let idx = self.check_handle(handle)?;
        self.slots[idx].as_mut().unwrap().fcb = fcb;
        Ok(())
    }
}
