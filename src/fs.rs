//! File system API (C5).
//!
//! Implements the shell-level operations by composing the block device
//! (C1), the FAT manager (C2), the directory block codec (C3), and the
//! path resolver (C4). Every operation refreshes the FAT from disk,
//! resolves its path(s), mutates in-memory structures, and flushes every
//! touched block before returning — there is no write-back cache.

use std::fmt::Write as _;
use std::io::BufRead;
use std::path::Path;

use crate::block::{BlockDevice, FileBlockDevice, BLOCK_COUNT, BLOCK_SIZE, ROOT_BLOCK};
use crate::dirblock::{AccessRights, DirBlock, DirEntry, EntryType, NAME_MAX_LEN};
use crate::error::{FsError, FsResult};
use crate::fat::FatTable;
use crate::path::{self, PathToken};

/// Number of blocks a file of `size` bytes occupies: `ceil(max(size, 1) /
/// BLOCK_SIZE)`, per the on-disk invariant that every file (even an empty
/// one) owns at least one block.
fn blocks_for_size(size: u32) -> usize {
    let size = size.max(1) as usize;
    (size + BLOCK_SIZE - 1) / BLOCK_SIZE
}

/// Bytes already occupied in a file's last block. A file whose size is an
/// exact, positive multiple of `BLOCK_SIZE` has its last block fully used
/// (the "emit full last block" resolution of the `cat` open question
/// applies symmetrically here: there is no spare room to append into).
fn last_block_used_bytes(size: u32) -> usize {
    if size == 0 {
        return 0;
    }
    let rem = size as usize % BLOCK_SIZE;
    if rem == 0 {
        BLOCK_SIZE
    } else {
        rem
    }
}

/// Split a tokenized path into (containing-directory tokens, leaf name).
/// Fails if the path has no final `Name` component (e.g. `""`, `"/"`, `".."`).
fn split_leaf(mut tokens: Vec<PathToken>) -> FsResult<(Vec<PathToken>, String)> {
    match tokens.pop() {
        Some(PathToken::Name(name)) => Ok((tokens, name)),
        _ => Err(FsError::InvalidPath),
    }
}

fn check_name_len(name: &str) -> FsResult<()> {
    if name.len() > NAME_MAX_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// A hierarchical file system persisted on a [`BlockDevice`].
pub struct FileSystem<D: BlockDevice> {
    device: D,
    fat: FatTable,
    cwd: u16,
}

impl FileSystem<FileBlockDevice> {
    /// Open (creating if absent) the image file at `path` and load its FAT.
    ///
    /// Does not format the image — callers of a fresh image must call
    /// [`FileSystem::format`] before use.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let device = FileBlockDevice::open(path)?;
        Self::from_device(device)
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// Build a file system on top of an already-open block device.
    pub fn from_device(mut device: D) -> FsResult<Self> {
        let fat = FatTable::load(&mut device)?;
        log::debug!("file system mounted at cwd=root");
        Ok(Self {
            device,
            fat,
            cwd: ROOT_BLOCK,
        })
    }

    /// Number of blocks currently free in the FAT.
    pub fn free_block_count(&self) -> usize {
        self.fat.count_free()
    }

    /// Access rights of the directory entry describing `block` itself (as
    /// opposed to the entries it contains). The root is hardcoded `rwx`;
    /// every other directory's rights live in its *parent's* entry for it.
    fn dir_access_rights(&mut self, block: u16) -> FsResult<AccessRights> {
        if block == ROOT_BLOCK {
            return Ok(AccessRights::RWX);
        }

        let child = DirBlock::load(&mut self.device, block)?;
        let parent_block = child.parent_link();
        let parent_dir = DirBlock::load(&mut self.device, parent_block)?;

        let result = parent_dir
            .iter_non_empty()
            .find(|(_, e)| e.first_blk == block && e.entry_type == EntryType::Dir)
            .map(|(_, e)| e.access)
            .ok_or(FsError::InvalidPath);
        result
    }

    fn resolve_parent(&mut self, path: &str) -> FsResult<(u16, String)> {
        let tokens = path::tokenize(path);
        let (parent_tokens, leaf) = split_leaf(tokens)?;
        let parent_block = path::resolve(&mut self.device, self.cwd, &parent_tokens)?;
        Ok((parent_block, leaf))
    }

    /// Read the full byte content of a file entry, applying the "emit full
    /// last block" resolution when `size` is a positive multiple of
    /// `BLOCK_SIZE`.
    fn read_chain_bytes(&mut self, entry: &DirEntry) -> FsResult<Vec<u8>> {
        let chain: Vec<u16> = self.fat.walk(entry.first_blk).collect();
        let last_idx = chain.len() - 1;
        let mut out = Vec::with_capacity(entry.size as usize);

        for (i, &blk) in chain.iter().enumerate() {
            let buf = self.device.read_block(blk)?;
            if i == last_idx {
                out.extend_from_slice(&buf[..last_block_used_bytes(entry.size)]);
            } else {
                out.extend_from_slice(&buf);
            }
        }

        Ok(out)
    }

    /// Reinitialize the image: zero every block, reset the FAT, and write
    /// an empty root directory. Resets `cwd` to the root.
    pub fn format(&mut self) -> FsResult<()> {
        let zero = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_COUNT {
            self.device.write_block(i, &zero)?;
        }

        self.fat = FatTable::formatted();
        self.fat.flush(&mut self.device)?;

        DirBlock::new_root().flush(&mut self.device, ROOT_BLOCK)?;
        self.cwd = ROOT_BLOCK;

        log::info!("formatted file system");
        Ok(())
    }

    /// Create a new file, reading its content line-by-line from `input`
    /// until a blank line (each stored line gets a trailing `\n`).
    pub fn create<R: BufRead>(&mut self, path: &str, input: &mut R) -> FsResult<()> {
        let (parent_block, leaf) = self.resolve_parent(path)?;

        if !self.dir_access_rights(parent_block)?.can_write() {
            return Err(FsError::PermissionDenied);
        }
        check_name_len(&leaf)?;

        let parent_dir = DirBlock::load(&mut self.device, parent_block)?;
        if parent_dir.find(&leaf).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if (1..crate::dirblock::ENTRIES_PER_DIR_BLOCK)
            .all(|k| parent_dir.entry(k).entry_type != EntryType::Empty)
        {
            return Err(FsError::DirectoryFull);
        }

        let mut data = Vec::new();
        loop {
            let mut line = String::new();
            let read = input.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                break;
            }
            data.extend_from_slice(trimmed.as_bytes());
            data.push(b'\n');
        }
        let size = data.len() as u32;

        let free = self.fat.count_free();
        if free == 0 || free < size as usize / BLOCK_SIZE {
            return Err(FsError::NoSpace);
        }

        let head = self.fat.reserve_free_block()?;
        self.fat
            .allocate_chain(head, blocks_for_size(size) - 1)?;

        let chain: Vec<u16> = self.fat.walk(head).collect();
        for (i, &blk) in chain.iter().enumerate() {
            let mut buf = [0u8; BLOCK_SIZE];
            let start = i * BLOCK_SIZE;
            if start < data.len() {
                let end = (start + BLOCK_SIZE).min(data.len());
                buf[..end - start].copy_from_slice(&data[start..end]);
            }
            self.device.write_block(blk, &buf)?;
        }

        let entry = DirEntry {
            name: leaf,
            size,
            first_blk: head,
            entry_type: EntryType::File,
            access: AccessRights::RW,
        };
        let mut parent_dir = DirBlock::load(&mut self.device, parent_block)?;
        parent_dir.insert(entry)?;
        parent_dir.flush(&mut self.device, parent_block)?;
        self.fat.flush(&mut self.device)?;

        Ok(())
    }

    /// Read the full content of a file.
    pub fn cat(&mut self, path: &str) -> FsResult<Vec<u8>> {
        let (parent_block, leaf) = self.resolve_parent(path)?;
        let dir = DirBlock::load(&mut self.device, parent_block)?;
        let (_, entry) = dir.find(&leaf).ok_or(FsError::NotFound)?;

        if entry.entry_type == EntryType::Dir {
            return Err(FsError::IsADirectory);
        }
        if !entry.access.can_read() {
            return Err(FsError::PermissionDenied);
        }

        self.read_chain_bytes(entry)
    }

    /// List the entries of the current directory, formatted as
    /// `name type accessrights size`.
    pub fn ls(&mut self) -> FsResult<String> {
        let dir = DirBlock::load(&mut self.device, self.cwd)?;

        let mut width = 4; // len("name")
        for (_, entry) in dir.iter_non_empty() {
            width = width.max(entry.name.len());
        }
        width += 2;

        let mut out = String::new();
        let _ = writeln!(out, "{:<width$}{:<6}{:<14}{:<10}", "name", "type", "accessrights", "size");

        for (_, entry) in dir.iter_non_empty() {
            let display_name = if entry.name == "/" { ".." } else { entry.name.as_str() };
            let type_str = match entry.entry_type {
                EntryType::Dir => "dir",
                EntryType::File => "file",
                EntryType::Empty => unreachable!(),
            };
            let size_str = match entry.entry_type {
                EntryType::Dir => "-".to_string(),
                _ => entry.size.to_string(),
            };
            let _ = writeln!(
                out,
                "{:<width$}{:<6}{:<14}{:<10}",
                display_name, type_str, entry.access, size_str
            );
        }

        Ok(out)
    }

    /// Copy the file at `src` to `dst`. If `dst` resolves to an existing
    /// directory, the copy is placed inside it under `src`'s own name.
    pub fn cp(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let (src_parent_block, src_leaf) = self.resolve_parent(src)?;
        let src_dir = DirBlock::load(&mut self.device, src_parent_block)?;
        let (_, src_entry) = src_dir.find(&src_leaf).ok_or(FsError::NotFound)?;
        let src_entry = src_entry.clone();

        if !src_entry.access.can_read() {
            return Err(FsError::PermissionDenied);
        }

        let (dst_parent_block, dst_leaf) = self.resolve_parent(dst)?;
        check_name_len(&dst_leaf)?;
        let dst_dir = DirBlock::load(&mut self.device, dst_parent_block)?;

        let (final_parent_block, final_name) = match dst_dir.find(&dst_leaf) {
            Some((_, existing)) if existing.entry_type == EntryType::Dir => {
                if !existing.access.can_write() {
                    return Err(FsError::PermissionDenied);
                }
                let inner_parent_block = existing.first_blk;
                let inner_dir = DirBlock::load(&mut self.device, inner_parent_block)?;
                if inner_dir.find(&src_leaf).is_some() {
                    return Err(FsError::AlreadyExists);
                }
                (inner_parent_block, src_leaf.clone())
            }
            Some(_) => return Err(FsError::AlreadyExists),
            None => (dst_parent_block, dst_leaf),
        };

        let mut final_dir = DirBlock::load(&mut self.device, final_parent_block)?;
        if (1..crate::dirblock::ENTRIES_PER_DIR_BLOCK)
            .all(|k| final_dir.entry(k).entry_type != EntryType::Empty)
        {
            return Err(FsError::DirectoryFull);
        }

        let needed = blocks_for_size(src_entry.size);
        if self.fat.count_free() < src_entry.size as usize / BLOCK_SIZE {
            return Err(FsError::NoSpace);
        }

        let head = self.fat.reserve_free_block()?;
        self.fat.allocate_chain(head, needed - 1)?;

        let src_chain: Vec<u16> = self.fat.walk(src_entry.first_blk).collect();
        let dst_chain: Vec<u16> = self.fat.walk(head).collect();
        for (&s, &d) in src_chain.iter().zip(dst_chain.iter()) {
            let buf = self.device.read_block(s)?;
            self.device.write_block(d, &buf)?;
        }

        let new_entry = DirEntry {
            name: final_name,
            size: src_entry.size,
            first_blk: head,
            entry_type: src_entry.entry_type,
            access: src_entry.access,
        };
        final_dir.insert(new_entry)?;
        final_dir.flush(&mut self.device, final_parent_block)?;
        self.fat.flush(&mut self.device)?;

        Ok(())
    }

    /// Move (and/or rename) `src` to `dst`.
    pub fn mv(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let src_tokens = path::tokenize(src);
        let (src_parent_tokens, src_leaf) = split_leaf(src_tokens)?;
        let src_parent_block = path::resolve(&mut self.device, self.cwd, &src_parent_tokens)?;

        let src_access = self.dir_access_rights(src_parent_block)?;
        if !(src_access.can_write() && src_access.can_execute()) {
            return Err(FsError::PermissionDenied);
        }

        let src_dir = DirBlock::load(&mut self.device, src_parent_block)?;
        let (src_idx, src_entry) = src_dir.find(&src_leaf).ok_or(FsError::NotFound)?;
        let (src_idx, src_entry) = (src_idx, src_entry.clone());

        let dst_tokens = path::tokenize(dst);
        let (target_parent_block, target_name) = if dst_tokens == vec![PathToken::Root] {
            (ROOT_BLOCK, src_leaf.clone())
        } else if matches!(dst_tokens.last(), Some(PathToken::Parent)) {
            let block = path::resolve(&mut self.device, self.cwd, &dst_tokens)?;
            (block, src_leaf.clone())
        } else {
            let (dst_parent_tokens, dst_leaf) = split_leaf(dst_tokens)?;
            check_name_len(&dst_leaf)?;
            let block = path::resolve(&mut self.device, self.cwd, &dst_parent_tokens)?;
            (block, dst_leaf)
        };

        let target_access = self.dir_access_rights(target_parent_block)?;
        if !(target_access.can_write() && target_access.can_execute()) {
            return Err(FsError::PermissionDenied);
        }

        let target_dir = DirBlock::load(&mut self.device, target_parent_block)?;
        let collision = target_dir.find(&target_name).map(|(_, e)| e.clone());

        match collision {
            Some(existing) if existing.entry_type == EntryType::Dir => {
                // Move src inside the existing directory, keeping src's own name.
                let inner_parent_block = existing.first_blk;
                let inner_dir = DirBlock::load(&mut self.device, inner_parent_block)?;
                if inner_dir.find(&src_leaf).is_some() {
                    return Err(FsError::AlreadyExists);
                }

                let mut moved_entry = src_entry.clone();
                moved_entry.name = src_leaf.clone();
                let mut inner_dir = DirBlock::load(&mut self.device, inner_parent_block)?;
                inner_dir.insert(moved_entry)?;
                inner_dir.flush(&mut self.device, inner_parent_block)?;

                self.relink_moved_dir_if_needed(&src_entry, inner_parent_block)?;

                let mut src_dir = DirBlock::load(&mut self.device, src_parent_block)?;
                src_dir.mark_empty(src_idx);
                src_dir.flush(&mut self.device, src_parent_block)?;
            }
            Some(_) => return Err(FsError::AlreadyExists),
            None => {
                let mut moved_entry = src_entry.clone();
                moved_entry.name = target_name;

                if target_parent_block == src_parent_block {
                    let mut dir = DirBlock::load(&mut self.device, src_parent_block)?;
                    dir.mark_empty(src_idx);
                    dir.insert(moved_entry)?;
                    dir.flush(&mut self.device, src_parent_block)?;

                    self.relink_moved_dir_if_needed(&src_entry, target_parent_block)?;
                } else {
                    let mut target_dir = DirBlock::load(&mut self.device, target_parent_block)?;
                    target_dir.insert(moved_entry)?;
                    target_dir.flush(&mut self.device, target_parent_block)?;

                    self.relink_moved_dir_if_needed(&src_entry, target_parent_block)?;

                    let mut src_dir = DirBlock::load(&mut self.device, src_parent_block)?;
                    src_dir.mark_empty(src_idx);
                    src_dir.flush(&mut self.device, src_parent_block)?;
                }
            }
        }

        Ok(())
    }

    /// When moving a directory across a parent boundary, rewrite its `..`
    /// entry to point at the new parent. The original implementation this
    /// crate is modeled on does not do this; this is a deliberate
    /// correction so that `pwd`/traversal stay consistent after the move.
    fn relink_moved_dir_if_needed(&mut self, moved: &DirEntry, new_parent_block: u16) -> FsResult<()> {
        if moved.entry_type != EntryType::Dir {
            return Ok(());
        }
        let mut moved_block = DirBlock::load(&mut self.device, moved.first_blk)?;
        if moved_block.parent_link() == new_parent_block {
            return Ok(());
        }
        moved_block.set_entry(
            0,
            DirEntry {
                name: "..".to_string(),
                size: 0,
                first_blk: new_parent_block,
                entry_type: EntryType::Dir,
                access: AccessRights::RWX,
            },
        );
        moved_block.flush(&mut self.device, moved.first_blk)?;
        Ok(())
    }

    /// Remove a file or empty, non-root, non-cwd directory.
    pub fn rm(&mut self, path: &str) -> FsResult<()> {
        let (parent_block, leaf) = self.resolve_parent(path)?;

        let access = self.dir_access_rights(parent_block)?;
        if !(access.can_write() && access.can_execute()) {
            return Err(FsError::PermissionDenied);
        }

        let mut dir = DirBlock::load(&mut self.device, parent_block)?;
        let (idx, entry) = dir.find(&leaf).ok_or(FsError::NotFound)?;
        let (idx, entry) = (idx, entry.clone());

        match entry.entry_type {
            EntryType::File => {
                dir.mark_empty(idx);
                dir.flush(&mut self.device, parent_block)?;
                self.fat.free_chain(entry.first_blk);
            }
            EntryType::Dir => {
                if entry.first_blk == self.cwd {
                    return Err(FsError::CannotRemoveCwd);
                }
                if entry.first_blk == ROOT_BLOCK {
                    return Err(FsError::CannotRemoveRoot);
                }
                let target = DirBlock::load(&mut self.device, entry.first_blk)?;
                if !target.is_empty_dir() {
                    return Err(FsError::NotEmpty);
                }

                dir.mark_empty(idx);
                dir.flush(&mut self.device, parent_block)?;
                self.fat.free_chain(entry.first_blk);
            }
            EntryType::Empty => unreachable!("find() never returns an empty entry"),
        }

        self.fat.flush(&mut self.device)?;
        Ok(())
    }

    /// Append the contents of `src` to the end of `dst`; `src` is
    /// unchanged.
    pub fn append(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let (src_parent_block, src_leaf) = self.resolve_parent(src)?;
        let src_dir = DirBlock::load(&mut self.device, src_parent_block)?;
        let (_, src_entry) = src_dir.find(&src_leaf).ok_or(FsError::NotFound)?;
        let src_entry = src_entry.clone();
        if src_entry.entry_type == EntryType::Dir {
            return Err(FsError::IsADirectory);
        }
        if !src_entry.access.can_read() {
            return Err(FsError::PermissionDenied);
        }

        let (dst_parent_block, dst_leaf) = self.resolve_parent(dst)?;
        let dst_dir = DirBlock::load(&mut self.device, dst_parent_block)?;
        let (_, dst_entry) = dst_dir.find(&dst_leaf).ok_or(FsError::NotFound)?;
        let dst_entry = dst_entry.clone();
        if dst_entry.entry_type == EntryType::Dir {
            return Err(FsError::IsADirectory);
        }
        if !dst_entry.access.can_write() {
            return Err(FsError::PermissionDenied);
        }

        let used = last_block_used_bytes(dst_entry.size);
        let remaining_in_tail = BLOCK_SIZE - used;
        let src_len = src_entry.size as usize;
        let extra_blocks_needed = src_len
            .saturating_sub(remaining_in_tail)
            .div_ceil(BLOCK_SIZE);

        if self.fat.count_free() < extra_blocks_needed {
            return Err(FsError::NoSpace);
        }

        let dst_chain_before: Vec<u16> = self.fat.walk(dst_entry.first_blk).collect();
        let tail = *dst_chain_before.last().unwrap();
        self.fat.allocate_chain(tail, extra_blocks_needed)?;

        let src_bytes = self.read_chain_bytes(&src_entry)?;

        let dst_chain_after: Vec<u16> = self.fat.walk(dst_entry.first_blk).collect();
        let mut block_idx = dst_chain_before.len() - 1;
        let mut offset = used;
        let mut written = 0usize;

        while written < src_bytes.len() {
            let blk = dst_chain_after[block_idx];
            let mut buf = if offset > 0 {
                self.device.read_block(blk)?
            } else {
                [0u8; BLOCK_SIZE]
            };

            let space = BLOCK_SIZE - offset;
            let take = space.min(src_bytes.len() - written);
            buf[offset..offset + take].copy_from_slice(&src_bytes[written..written + take]);
            self.device.write_block(blk, &buf)?;

            written += take;
            offset = 0;
            block_idx += 1;
        }

        let mut dst_dir = DirBlock::load(&mut self.device, dst_parent_block)?;
        let (idx, _) = dst_dir.find(&dst_leaf).ok_or(FsError::NotFound)?;
        let mut updated = dst_entry.clone();
        updated.size = src_entry.size + dst_entry.size;
        dst_dir.set_entry(idx, updated);
        dst_dir.flush(&mut self.device, dst_parent_block)?;
        self.fat.flush(&mut self.device)?;

        Ok(())
    }

    /// Create a new sub-directory in the current directory.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let (parent_block, leaf) = self.resolve_parent(path)?;
        check_name_len(&leaf)?;

        if !self.dir_access_rights(parent_block)?.can_write() {
            return Err(FsError::PermissionDenied);
        }

        let mut parent_dir = DirBlock::load(&mut self.device, parent_block)?;
        if parent_dir.find(&leaf).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if (1..crate::dirblock::ENTRIES_PER_DIR_BLOCK)
            .all(|k| parent_dir.entry(k).entry_type != EntryType::Empty)
        {
            return Err(FsError::DirectoryFull);
        }

        let block = self.fat.reserve_free_block()?;

        let entry = DirEntry {
            name: leaf,
            size: 0,
            first_blk: block,
            entry_type: EntryType::Dir,
            access: AccessRights::RWX,
        };
        parent_dir.insert(entry)?;
        parent_dir.flush(&mut self.device, parent_block)?;

        DirBlock::new_child(parent_block).flush(&mut self.device, block)?;
        self.fat.flush(&mut self.device)?;

        Ok(())
    }

    /// Change the current working directory.
    pub fn cd(&mut self, path: &str) -> FsResult<()> {
        let tokens = path::tokenize(path);
        let target = path::resolve(&mut self.device, self.cwd, &tokens)?;
        self.cwd = target;
        Ok(())
    }

    /// The absolute path from root to the current working directory.
    pub fn pwd(&mut self) -> FsResult<String> {
        let mut parts = Vec::new();
        let mut current = self.cwd;

        while current != ROOT_BLOCK {
            let child = DirBlock::load(&mut self.device, current)?;
            let parent_block = child.parent_link();
            let parent_dir = DirBlock::load(&mut self.device, parent_block)?;

            let name = parent_dir
                .iter_non_empty()
                .find(|(_, e)| e.first_blk == current && e.entry_type == EntryType::Dir)
                .map(|(_, e)| e.name.clone())
                .ok_or(FsError::InvalidPath)?;

            parts.push(name);
            current = parent_block;
        }

        parts.reverse();
        if parts.is_empty() {
            Ok("/".to_string())
        } else {
            Ok(format!("/{}", parts.join("/")))
        }
    }

    /// Change the access rights of `path` to `bits` (decimal, `0..=7`).
    pub fn chmod(&mut self, bits: &str, path: &str) -> FsResult<()> {
        let rights: u8 = bits.parse().map_err(|_| FsError::InvalidPath)?;
        if rights > 7 {
            return Err(FsError::InvalidPath);
        }

        let (parent_block, leaf) = self.resolve_parent(path)?;
        let mut dir = DirBlock::load(&mut self.device, parent_block)?;
        let (idx, entry) = dir.find(&leaf).ok_or(FsError::NotFound)?;
        let (idx, mut entry) = (idx, entry.clone());

        entry.access = AccessRights(rights);
        dir.set_entry(idx, entry);
        dir.flush(&mut self.device, parent_block)?;

        Ok(())
    }
}
