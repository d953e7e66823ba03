//! The filesystem engine: mount lifecycle, path resolution, block-chain
//! allocation, and the file/directory operations built on top of them. See
//! `SPEC_FULL.md` §4.6.
//!
//! Grounded on the teacher's `FatFs` struct (`examples/rrbutani-fatfs/src/fat/mod.rs`)
//! for the overall mount-state shape, and on `FatEntryTracer::grow_file` /
//! `FatEntryWrapper::read`/`write` (`examples/rrbutani-fatfs/src/fat/table.rs`)
//! for the offset-clamped copy loops in the positional read/write helpers.

use log::{debug, trace, warn};

use crate::block_device::BlockDevice;
use crate::error::{Result, TfsError};
use crate::fat::dir::{Directory, Fcb, ROOT_NAME};
use crate::fat::oft::OpenFileTable;
use crate::fat::pcb::Pcb;
use crate::fat::table::{self, Fat};
use crate::util::{blocks_needed, ceil_div};

/// Where a mutated directory's parent entry lives, so that size changes can
/// be propagated up (`SPEC_FULL.md` §4.6.2/§4.6.3).
struct AncestorCtx {
    dir: Directory,
    block: u32,
    is_root: bool,
    name_in_ancestor: String,
}

struct ParentCtx {
    parent_block: u32,
    is_root: bool,
    ancestor: Option<AncestorCtx>,
}

/// Orchestrates mkfs/mount/unmount, path resolution, and every file/directory
/// operation. Mount state lives in four parallel `Option`s that are `Some`
/// together exactly when `mounted` is true; there is no other global state.
#[derive(Debug, Default)]
pub struct Engine {
    device: Option<BlockDevice>,
    pcb: Option<Pcb>,
    root: Option<Directory>,
    oft: Option<OpenFileTable>,
    mounted: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn require_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(TfsError::NotMounted)
        }
    }

    fn block_size(&self) -> u32 {
        self.pcb.as_ref().unwrap().block_size
    }

    // ---- mount lifecycle -------------------------------------------------

    pub fn mkfs(&mut self, name: &str, total_bytes: u64, block_size: u32) -> Result<()> {
        debug!("mkfs({:?}, {}, {})", name, total_bytes, block_size);
        if self.mounted {
            warn!("mkfs({:?}) while mounted", name);
            return Err(TfsError::AlreadyMounted);
        }

        let device = BlockDevice::create(name, total_bytes, block_size)?;
        let num_blocks = device.get_block_count();
        let pcb_end = Pcb::pcb_blocks(num_blocks, block_size).saturating_sub(1);

        let mut fat = Fat::new(num_blocks, pcb_end);
        for i in 0..pcb_end {
            fat.set(i, i as i32 + 1)?;
        }
        fat.set(pcb_end, table::END_OF_CHAIN)?;

        let root_dir_block = pcb_end + 1;
        let pcb = Pcb {
            block_size,
            num_blocks,
            first_free_block: root_dir_block,
            root_dir_block,
            fat,
        };

        self.device = Some(device);
        self.pcb = Some(pcb);

        let mut root = Directory::new();
        root.add(Fcb::new(ROOT_NAME, true, root_dir_block, crate::fat::dir::FCB_LEN as u32))?;
        self.write_dir_at(&root, root_dir_block)?;

        self.device = None;
        self.pcb = None;
        Ok(())
    }

    pub fn mount(&mut self, name: &str, total_bytes: u64, block_size: u32) -> Result<()> {
        debug!("mount({:?}, {}, {})", name, total_bytes, block_size);
        if self.mounted {
            warn!("mount({:?}) while already mounted", name);
            return Err(TfsError::AlreadyMounted);
        }

        let mut device = BlockDevice::open(name, total_bytes, block_size)?;
        let num_blocks = device.get_block_count();
        let pcb_end = Pcb::pcb_blocks(num_blocks, block_size).saturating_sub(1);
        let needed = (Pcb::pcb_blocks(num_blocks, block_size) * block_size) as usize;

        let mut raw = vec![0u8; needed];
        for i in 0..=pcb_end {
            let start = (i * block_size) as usize;
            device.read_block(i, &mut raw[start..start + block_size as usize])?;
        }

        let pcb = Pcb::decode(&raw, block_size, num_blocks)?;
        let root_dir_block = pcb.root_dir_block;

        self.device = Some(device);
        self.pcb = Some(pcb);

        // Two-phase root load: read the 24-byte self-FCB first to learn the
        // real size, then re-read the whole directory (spec §9, "self-describing root").
        let bootstrap = self.read_dir_at(root_dir_block, crate::fat::dir::FCB_LEN as i64)?;
        let root_size = bootstrap.get(0).size_bytes;
        let root = self.read_dir_at(root_dir_block, root_size as i64)?;

        self.root = Some(root);
        self.oft = Some(OpenFileTable::new((total_bytes / block_size as u64) as u32));
        self.mounted = true;
        Ok(())
    }

    pub fn unmount(&mut self) -> Result<()> {
        debug!("unmount()");
        self.require_mounted()?;

        self.flush_pcb()?;

        let root_dir_block = self.pcb.as_ref().unwrap().root_dir_block;
        let mut root = self.root.as_ref().unwrap().clone();
        let size = root.byte_size();
        root.update_size(ROOT_NAME, true, size)?;
        self.write_dir_at(&root, root_dir_block)?;

        self.device = None;
        self.pcb = None;
        self.root = None;
        self.oft = None;
        self.mounted = false;
        Ok(())
    }

    fn flush_pcb(&mut self) -> Result<()> {
        let pcb = self.pcb.as_ref().unwrap();
        let encoded = pcb.encode();
        let block_size = pcb.block_size;
        let pcb_end = Pcb::pcb_blocks(pcb.num_blocks, block_size).saturating_sub(1);

        let device = self.device.as_mut().unwrap();
        for i in 0..=pcb_end {
            let start = (i * block_size) as usize;
            device.write_block(i, &encoded[start..start + block_size as usize])?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        trace!("sync()");
        self.require_mounted()?;
        self.flush_pcb()
    }

    // ---- path grammar & tree walk ----------------------------------------

    fn parse_path(path: &str) -> Result<Vec<String>> {
        if !path.starts_with('/') {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        if path == "/" {
            return Ok(Vec::new());
        }
        if path.ends_with('/') {
            return Err(TfsError::InvalidPath(path.to_string()));
        }

        let mut components = Vec::new();
        for part in path[1..].split('/') {
            if part.is_empty() || part.chars().any(|c| c.is_whitespace()) {
                return Err(TfsError::InvalidPath(path.to_string()));
            }
            components.push(part.to_string());
        }
        Ok(components)
    }

    /// Walks `n` components from the root, loading each intermediate
    /// directory from disk. Returns the directory reached and its block.
    fn walk_n(&mut self, components: &[String], n: usize) -> Result<(Directory, u32)> {
        let mut cur = self.root.as_ref().unwrap().clone();
        let mut cur_block = self.pcb.as_ref().unwrap().root_dir_block;

        for name in &components[..n] {
            let idx = cur
                .find(name, true)
                .ok_or_else(|| TfsError::PathNotFound(name.clone()))?;
            let fcb = cur.get(idx).clone();
            cur_block = fcb.starting_block;
            cur = self.read_dir_at(cur_block, fcb.size_bytes as i64)?;
        }

        Ok((cur, cur_block))
    }

    /// Locates the directory that would contain the last path component,
    /// along with enough context (`ParentCtx`) to propagate a size change
    /// back up to the root after the caller mutates it.
    fn resolve_parent(&mut self, components: &[String]) -> Result<(Directory, ParentCtx)> {
        let k = components.len();
        if k == 0 {
            return Err(TfsError::InvalidPath("/".to_string()));
        }

        let root_dir_block = self.pcb.as_ref().unwrap().root_dir_block;

        if k == 1 {
            let parent = self.root.as_ref().unwrap().clone();
            return Ok((
                parent,
                ParentCtx {
                    parent_block: root_dir_block,
                    is_root: true,
                    ancestor: None,
                },
            ));
        }

        let (ancestor_dir, ancestor_block) = self.walk_n(components, k - 2)?;
        let pname = components[k - 2].clone();
        let idx = ancestor_dir
            .find(&pname, true)
            .ok_or_else(|| TfsError::PathNotFound(pname.clone()))?;
        let pfcb = ancestor_dir.get(idx).clone();
        let parent = self.read_dir_at(pfcb.starting_block, pfcb.size_bytes as i64)?;
        let ancestor_is_root = ancestor_block == root_dir_block;

        Ok((
            parent,
            ParentCtx {
                parent_block: pfcb.starting_block,
                is_root: false,
                ancestor: Some(AncestorCtx {
                    dir: ancestor_dir,
                    block: ancestor_block,
                    is_root: ancestor_is_root,
                    name_in_ancestor: pname,
                }),
            },
        ))
    }

    /// Writes a mutated parent directory back and propagates its new byte
    /// size to whichever container needs to know it (spec §4.6.3).
    fn commit_parent(&mut self, mut parent: Directory, ctx: ParentCtx) -> Result<()> {
        if ctx.is_root {
            let new_size = parent.byte_size();
            parent.update_size(ROOT_NAME, true, new_size)?;
            self.write_dir_at(&parent, ctx.parent_block)?;
            self.root = Some(parent);
            return Ok(());
        }

        self.write_dir_at(&parent, ctx.parent_block)?;

        if let Some(anc) = ctx.ancestor {
            let mut ancestor = anc.dir;
            ancestor.update_size(&anc.name_in_ancestor, true, parent.byte_size())?;
            self.write_dir_at(&ancestor, anc.block)?;
            if anc.is_root {
                self.root = Some(ancestor);
            }
        }

        Ok(())
    }

    // ---- block-chain primitives -------------------------------------------

    fn write_blocks(&mut self, buf: &[u8], l: u32) -> Result<()> {
        trace!("write_blocks(len={}, l={})", buf.len(), l);
        let block_size = self.block_size();
        let k = if buf.is_empty() {
            1
        } else {
            ceil_div(buf.len() as u32, block_size) as usize
        };

        let head = self.pcb.as_ref().unwrap().fat.get(l as i64);

        if head == table::FREE {
            let first_free_block = self.pcb.as_ref().unwrap().first_free_block;

            if k == 1 {
                let chunk = chunk_of(buf, 0, block_size);
                self.device.as_mut().unwrap().write_block(l, &chunk)?;
                self.pcb.as_mut().unwrap().fat.set(l, table::END_OF_CHAIN)?;
            } else {
                let extra = self.pcb.as_ref().unwrap().fat.allocate(k - 1, first_free_block)?;

                let chunk = chunk_of(buf, 0, block_size);
                self.device.as_mut().unwrap().write_block(l, &chunk)?;
                self.pcb.as_mut().unwrap().fat.set(l, extra[0] as i32)?;

                for (i, &block) in extra.iter().enumerate() {
                    let chunk = chunk_of(buf, i + 1, block_size);
                    self.device.as_mut().unwrap().write_block(block, &chunk)?;
                    let next = if i + 1 < extra.len() {
                        extra[i + 1] as i32
                    } else {
                        table::END_OF_CHAIN
                    };
                    self.pcb.as_mut().unwrap().fat.set(block, next)?;
                }
            }

            if l == first_free_block {
                let new_pivot = self.pcb.as_ref().unwrap().fat.one_free(l);
                if new_pivot >= 0 {
                    self.pcb.as_mut().unwrap().first_free_block = new_pivot as u32;
                }
            }
        } else {
            let chain: Vec<u32> = self.pcb.as_ref().unwrap().fat.walk(l).collect();
            let common = chain.len().min(k);

            for (i, &block) in chain.iter().take(common).enumerate() {
                let chunk = chunk_of(buf, i, block_size);
                self.device.as_mut().unwrap().write_block(block, &chunk)?;
            }

            if chain.len() > k {
                self.pcb.as_mut().unwrap().fat.set(chain[common - 1], table::END_OF_CHAIN)?;
                for &block in &chain[common..] {
                    self.pcb.as_mut().unwrap().fat.set(block, table::FREE)?;
                }
            } else if chain.len() < k {
                let first_free_block = self.pcb.as_ref().unwrap().first_free_block;
                let extra = self
                    .pcb
                    .as_ref()
                    .unwrap()
                    .fat
                    .allocate(k - chain.len(), first_free_block)?;

                let last_existing = chain[chain.len() - 1];
                self.pcb.as_mut().unwrap().fat.set(last_existing, extra[0] as i32)?;

                for (i, &block) in extra.iter().enumerate() {
                    let chunk = chunk_of(buf, chain.len() + i, block_size);
                    self.device.as_mut().unwrap().write_block(block, &chunk)?;
                    let next = if i + 1 < extra.len() {
                        extra[i + 1] as i32
                    } else {
                        table::END_OF_CHAIN
                    };
                    self.pcb.as_mut().unwrap().fat.set(block, next)?;
                }
            }
        }

        self.flush_pcb()
    }

    fn read_blocks(&mut self, l: u32) -> Result<Vec<u8>> {
        trace!("read_blocks(l={})", l);
        let head = self.pcb.as_ref().unwrap().fat.get(l as i64);
        if head == table::FREE || head == table::OUT_OF_RANGE {
            return Err(TfsError::InvalidRead(l as i64));
        }

        let block_size = self.block_size();
        let chain: Vec<u32> = self.pcb.as_ref().unwrap().fat.walk(l).collect();

        let mut buf = Vec::with_capacity(chain.len() * block_size as usize);
        for block in chain {
            let mut chunk = vec![0u8; block_size as usize];
            self.device.as_mut().unwrap().read_block(block, &mut chunk)?;
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }

    fn read_dir_at(&mut self, block: u32, size: i64) -> Result<Directory> {
        let bytes = self.read_blocks(block)?;
        Directory::from_bytes(&bytes, size)
    }

    fn write_dir_at(&mut self, dir: &Directory, block: u32) -> Result<()> {
        self.write_blocks(&dir.to_bytes(), block)
    }

    // ---- positional (offset-aware) file I/O --------------------------------

    fn write_bytes(&mut self, handle: i64, buf: &[u8]) -> Result<()> {
        let offset = self.oft.as_ref().unwrap().get_offset(handle)?;
        let fcb = self.oft.as_ref().unwrap().get_fcb(handle)?.clone();

        let mut whole = self.read_blocks(fcb.starting_block)?;
        let offset = offset as usize;
        let needed_len = offset + buf.len();
        if whole.len() < needed_len {
            whole.resize(needed_len, 0);
        }
        whole[offset..needed_len].copy_from_slice(buf);

        self.write_blocks(&whole, fcb.starting_block)
    }

    fn read_bytes(&mut self, handle: i64, len: u32) -> Result<Vec<u8>> {
        let offset = self.oft.as_ref().unwrap().get_offset(handle)?;
        let fcb = self.oft.as_ref().unwrap().get_fcb(handle)?.clone();
        let block_size = self.block_size();

        let start_block_nth = (offset / block_size) as usize;
        let chain: Vec<u32> = self.pcb.as_ref().unwrap().fat.walk(fcb.starting_block).collect();

        let mut result = Vec::with_capacity(len as usize);
        let mut remaining = len;
        let mut local_off = (offset % block_size) as usize;

        for &block in chain.iter().skip(start_block_nth) {
            if remaining == 0 {
                break;
            }
            let mut chunk = vec![0u8; block_size as usize];
            self.device.as_mut().unwrap().read_block(block, &mut chunk)?;

            let avail = block_size as usize - local_off;
            let take = avail.min(remaining as usize);
            result.extend_from_slice(&chunk[local_off..local_off + take]);
            remaining -= take as u32;
            local_off = 0;
        }

        Ok(result)
    }

    // ---- directory operations ----------------------------------------------

    pub fn ls(&mut self, path: &str) -> Result<Vec<Fcb>> {
        debug!("ls({:?})", path);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;

        if components.is_empty() {
            return Ok(self.root.as_ref().unwrap().entries().to_vec());
        }

        let (dir, _block) = self.walk_n(&components, components.len())?;
        Ok(dir.entries().to_vec())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        debug!("mkdir({:?})", path);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        if parent.contains(&name, true) {
            warn!("mkdir({:?}) duplicate", path);
            return Err(TfsError::DuplicateEntry(name));
        }

        let l = self.pcb.as_ref().unwrap().first_free_block;
        self.write_dir_at(&Directory::new(), l)?;

        parent.add(Fcb::new(&name, true, l, 0))?;
        self.commit_parent(parent, ctx)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        debug!("rmdir({:?})", path);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        let idx = parent
            .find(&name, true)
            .ok_or_else(|| TfsError::NotFound(name.clone()))?;
        let fcb = parent.get(idx).clone();

        if ctx.is_root && fcb.is_root_self_entry() {
            warn!("rmdir({:?}) targets root", path);
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        if fcb.size_bytes != 0 {
            warn!("rmdir({:?}) not empty", path);
            return Err(TfsError::DirNotEmpty(name));
        }

        let root_dir_block = self.pcb.as_ref().unwrap().root_dir_block;
        self.pcb.as_mut().unwrap().fat.free_chain(fcb.starting_block, root_dir_block)?;
        self.flush_pcb()?;

        parent.remove_by_name(&name, true)?;
        self.commit_parent(parent, ctx)
    }

    // ---- file operations ----------------------------------------------------

    pub fn create(&mut self, path: &str, size: u32) -> Result<u32> {
        debug!("create({:?}, {})", path, size);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        if parent.contains(&name, false) {
            warn!("create({:?}) duplicate", path);
            return Err(TfsError::DuplicateEntry(name));
        }

        let block_size = self.block_size();
        let w = blocks_needed(size, block_size) * block_size;
        let l = self.pcb.as_ref().unwrap().first_free_block;
        self.write_blocks(&vec![0u8; w as usize], l)?;

        parent.add(Fcb::new(&name, false, l, size))?;
        self.commit_parent(parent, ctx)?;
        Ok(l)
    }

    pub fn rm(&mut self, path: &str) -> Result<()> {
        debug!("rm({:?})", path);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        let idx = parent
            .find(&name, false)
            .ok_or_else(|| TfsError::NotFound(name.clone()))?;
        let fcb = parent.get(idx).clone();

        let root_dir_block = self.pcb.as_ref().unwrap().root_dir_block;
        self.pcb.as_mut().unwrap().fat.free_chain(fcb.starting_block, root_dir_block)?;
        self.flush_pcb()?;

        if let Some(h) = self.oft.as_ref().unwrap().lookup_handle(&fcb) {
            self.oft.as_mut().unwrap().remove(h)?;
        }

        parent.remove_by_name(&name, false)?;
        self.commit_parent(parent, ctx)
    }

    pub fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        debug!("append({:?}, {} bytes)", path, data.len());
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        let idx = parent
            .find(&name, false)
            .ok_or_else(|| TfsError::NotFound(name.clone()))?;
        let fcb = parent.get(idx).clone();
        let old_size = fcb.size_bytes;

        let handle = match self.oft.as_ref().unwrap().lookup_handle(&fcb) {
            Some(h) => {
                self.oft.as_mut().unwrap().update_offset(h, old_size)?;
                h
            }
            None => self.oft.as_mut().unwrap().add(fcb.clone(), old_size)?,
        };

        self.write_bytes(handle, data)?;

        let new_size = old_size + data.len() as u32;
        let mut new_fcb = fcb.clone();
        new_fcb.size_bytes = new_size;
        self.oft.as_mut().unwrap().update_fcb(handle, new_fcb)?;
        self.oft.as_mut().unwrap().update_offset(handle, new_size)?;

        parent.update_size(&name, false, new_size)?;
        self.commit_parent(parent, ctx)
    }

    pub fn print(&mut self, path: &str, position: u32, n: u32) -> Result<String> {
        debug!("print({:?}, {}, {})", path, position, n);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (parent, _ctx) = self.resolve_parent(&components)?;
        let idx = parent
            .find(&name, false)
            .ok_or_else(|| TfsError::NotFound(name.clone()))?;
        let fcb = parent.get(idx).clone();

        if position > fcb.size_bytes || position + n > fcb.size_bytes {
            warn!("print({:?}) out-of-range read", path);
            return Err(TfsError::InvalidRead(position as i64));
        }

        let handle = match self.oft.as_ref().unwrap().lookup_handle(&fcb) {
            Some(h) => h,
            None => self.oft.as_mut().unwrap().add(fcb.clone(), position)?,
        };
        self.oft.as_mut().unwrap().update_offset(handle, position)?;

        let bytes = self.read_bytes(handle, n)?;
        self.oft.as_mut().unwrap().update_offset(handle, position + n)?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        debug!("rename({:?}, {:?})", path, new_name);
        self.require_mounted()?;
        let components = Self::parse_path(path)?;
        if components.is_empty() {
            return Err(TfsError::InvalidPath(path.to_string()));
        }
        let name = components.last().unwrap().clone();

        let (mut parent, ctx) = self.resolve_parent(&components)?;
        let idx = parent
            .find(&name, false)
            .ok_or_else(|| TfsError::NotFound(name.clone()))?;

        if parent.contains(new_name, false) {
            warn!("rename({:?}, {:?}) duplicate", path, new_name);
            return Err(TfsError::DuplicateEntry(new_name.to_string()));
        }

        let old_fcb = parent.get(idx).clone();
        let handle = self.oft.as_ref().unwrap().lookup_handle(&old_fcb);

        parent.update_name(&name, false, new_name)?;

        if let Some(h) = handle {
            let mut new_fcb = old_fcb;
            new_fcb.set_name(new_name);
            self.oft.as_mut().unwrap().update_fcb(h, new_fcb)?;
        }

        self.commit_parent(parent, ctx)
    }

    pub fn cp(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("cp({:?}, {:?})", src, dst);
        self.require_mounted()?;
        let src_components = Self::parse_path(src)?;
        if src_components.is_empty() {
            return Err(TfsError::InvalidPath(src.to_string()));
        }
        let src_name = src_components.last().unwrap().clone();

        let (src_parent, _src_ctx) = self.resolve_parent(&src_components)?;
        let idx = src_parent
            .find(&src_name, false)
            .ok_or_else(|| TfsError::NotFound(src_name.clone()))?;
        let src_fcb = src_parent.get(idx).clone();

        // Source must be non-empty; folded into the same NotFound class as a
        // missing source, per the op table in SPEC_FULL.md §7.
        if src_fcb.size_bytes == 0 {
            warn!("cp({:?}) empty source", src);
            return Err(TfsError::NotFound(src_name));
        }

        let chain_bytes = self.read_blocks(src_fcb.starting_block)?;
        let l = self.create(dst, src_fcb.size_bytes)?;
        self.write_blocks(&chain_bytes, l)
    }

    // ---- introspection --------------------------------------------------

    pub fn print_memory_state(&self) -> Result<String> {
        self.require_mounted()?;
        let pcb = self.pcb.as_ref().unwrap();
        let root = self.root.as_ref().unwrap();
        Ok(format!(
            "block_size={}\nnum_blocks={}\nfirst_free_block={}\nroot_dir_block={}\nroot_entries={}\n",
            pcb.block_size,
            pcb.num_blocks,
            pcb.first_free_block,
            pcb.root_dir_block,
            root.entries().len(),
        ))
    }

    pub fn print_disk_state(&mut self) -> Result<String> {
        self.require_mounted()?;
        let block_size = self.block_size();
        let num_blocks = self.pcb.as_ref().unwrap().num_blocks;
        let pcb_end = Pcb::pcb_blocks(num_blocks, block_size).saturating_sub(1);
        let needed = (Pcb::pcb_blocks(num_blocks, block_size) * block_size) as usize;

        let mut raw = vec![0u8; needed];
        for i in 0..=pcb_end {
            let start = (i * block_size) as usize;
            self.device
                .as_mut()
                .unwrap()
                .read_block(i, &mut raw[start..start + block_size as usize])?;
        }

        let on_disk = Pcb::decode(&raw, block_size, num_blocks)?;
        Ok(format!(
            "block_size={}\nnum_blocks={}\nfirst_free_block={}\nroot_dir_block={}\n",
            on_disk.block_size, on_disk.num_blocks, on_disk.first_free_block, on_disk.root_dir_block,
        ))
    }
}

fn chunk_of(buf: &[u8], block_idx: usize, block_size: u32) -> Vec<u8> {
    let start = block_idx * block_size as usize;
    if start >= buf.len() {
        return Vec::new();
    }
    let end = (start + block_size as usize).min(buf.len());
    buf[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mounted(dir: &std::path::Path) -> Engine {
        let path = dir.join("TFSDiskFile");
        let path = path.to_str().unwrap();
        let mut engine = Engine::new();
        engine.mkfs(path, 65535, 128).unwrap();
        engine.mount(path, 65535, 128).unwrap();
        engine
    }

    #[test]
    fn mkfs_then_mount_reports_expected_geometry() {
        let dir = tempdir().unwrap();
        let engine = mounted(dir.path());
        let state = engine.print_memory_state().unwrap();
        assert!(state.contains("block_size=128"));
        assert!(state.contains("num_blocks=511"));
    }

    #[test]
    fn mkdir_nested_and_ls() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        engine.mkdir("/a").unwrap();
        engine.mkdir("/a/b").unwrap();
        engine.mkdir("/a/b/c").unwrap();

        let entries = engine.ls("/a/b").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "c");
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size_bytes, 0);
    }

    #[test]
    fn create_append_and_print_round_trip() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        engine.create("/f", 0).unwrap();
        engine.append("/f", b"hello").unwrap();
        let out = engine.print("/f", 0, 5).unwrap();
        assert_eq!(out, "hello");

        let entries = engine.ls("/").unwrap();
        let f = entries.iter().find(|e| e.name() == "f").unwrap();
        assert_eq!(f.size_bytes, 5);
    }

    #[test]
    fn rename_to_distinct_name_then_self_fails_duplicate() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        engine.create("/x", 0).unwrap();
        engine.rename("/x", "y").unwrap();

        let entries = engine.ls("/").unwrap();
        assert!(entries.iter().any(|e| e.name() == "y"));
        assert!(!entries.iter().any(|e| e.name() == "x"));

        assert!(matches!(
            engine.rename("/y", "y"),
            Err(TfsError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn cp_copies_contents() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        engine.create("/src", 0).unwrap();
        engine.append("/src", b"ABC").unwrap();
        engine.cp("/src", "/dst").unwrap();

        assert_eq!(engine.print("/dst", 0, 3).unwrap(), "ABC");
        let entries = engine.ls("/").unwrap();
        assert!(entries.iter().any(|e| e.name() == "src"));
        assert!(entries.iter().any(|e| e.name() == "dst"));
    }

    #[test]
    fn rmdir_requires_empty_directory() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        engine.mkdir("/d").unwrap();
        engine.create("/d/f", 0).unwrap();

        assert!(matches!(engine.rmdir("/d"), Err(TfsError::DirNotEmpty(_))));

        engine.rm("/d/f").unwrap();
        engine.rmdir("/d").unwrap();

        let entries = engine.ls("/").unwrap();
        assert!(!entries.iter().any(|e| e.name() == "d"));
    }

    #[test]
    fn write_bytes_extends_chain_past_one_block() {
        let dir = tempdir().unwrap();
        let mut engine = mounted(dir.path());

        let big = vec![b'x'; 500];
        engine.create("/big", 0).unwrap();
        engine.append("/big", &big).unwrap();

        let out = engine.print("/big", 0, 500).unwrap();
        assert_eq!(out.len(), 500);
        assert!(out.chars().all(|c| c == 'x'));
    }

    #[test]
    fn unmounted_engine_rejects_operations() {
        let mut engine = Engine::new();
        assert!(matches!(engine.ls("/"), Err(TfsError::NotMounted)));
    }
}
