//! Directory block codec (C3).
//!
//! Encodes/decodes a 4096-byte block as 64 fixed 64-byte directory entries.
//! Slot 0 is reserved: for any non-root directory it holds the `..` parent
//! link; for the root it holds the self-referential `/` entry rendered as
//! `..` by `ls`.

use std::fmt;

use crate::block::{Block, BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};

/// Number of 64-byte directory entries packed into one block.
pub const ENTRIES_PER_DIR_BLOCK: usize = 64;

/// On-disk size of one directory entry.
pub const DIR_ENTRY_SIZE: usize = 64;

/// Maximum number of significant name bytes (the 56-byte field minus the
/// trailing NUL terminator).
pub const NAME_MAX_LEN: usize = 55;

const NAME_OFFSET: usize = 0;
const NAME_FIELD_LEN: usize = 56;
const SIZE_OFFSET: usize = 56;
const FIRST_BLK_OFFSET: usize = 60;
const TYPE_OFFSET: usize = 62;
const ACCESS_OFFSET: usize = 63;

/// Type tag of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Dir,
    Empty,
}

impl EntryType {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::File,
            1 => Self::Dir,
            _ => Self::Empty,
        }
    }

    fn to_raw(self) -> u8 {
        match self {
            Self::File => 0,
            Self::Dir => 1,
            Self::Empty => 2,
        }
    }
}

/// Access-rights bitmask: `R=0x04`, `W=0x02`, `X=0x01`. `X` gates traversal
/// into a directory, not execution of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights(pub u8);

impl AccessRights {
    pub const READ: u8 = 0x04;
    pub const WRITE: u8 = 0x02;
    pub const EXECUTE: u8 = 0x01;
    pub const NONE: AccessRights = AccessRights(0);
    pub const RW: AccessRights = AccessRights(Self::READ | Self::WRITE);
    pub const RWX: AccessRights = AccessRights(Self::READ | Self::WRITE | Self::EXECUTE);

    pub fn can_read(self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn can_write(self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn can_execute(self) -> bool {
        self.0 & Self::EXECUTE != 0
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.can_read() { 'r' } else { '-' };
        let w = if self.can_write() { 'w' } else { '-' };
        let x = if self.can_execute() { 'x' } else { '-' };
        write!(f, "{r}{w}{x}")
    }
}

/// A single decoded directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u32,
    pub first_blk: u16,
    pub entry_type: EntryType,
    pub access: AccessRights,
}

impl DirEntry {
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            size: 0,
            first_blk: 0,
            entry_type: EntryType::Empty,
            access: AccessRights::NONE,
        }
    }

    fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut bytes = [0u8; DIR_ENTRY_SIZE];
        let name_bytes = self.name.as_bytes();
        // NUL-padded to 56 bytes on write; caller guarantees name_bytes.len() <= NAME_MAX_LEN.
        bytes[NAME_OFFSET..NAME_OFFSET + name_bytes.len()].copy_from_slice(name_bytes);
        bytes[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&self.size.to_le_bytes());
        bytes[FIRST_BLK_OFFSET..FIRST_BLK_OFFSET + 2]
            .copy_from_slice(&self.first_blk.to_le_bytes());
        bytes[TYPE_OFFSET] = self.entry_type.to_raw();
        bytes[ACCESS_OFFSET] = self.access.0;
        bytes
    }

    fn from_bytes(bytes: &[u8; DIR_ENTRY_SIZE]) -> Self {
        // On read, take bytes up to the first NUL.
        let name_field = &bytes[NAME_OFFSET..NAME_OFFSET + NAME_FIELD_LEN];
        let nul_at = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        let name = String::from_utf8_lossy(&name_field[..nul_at]).into_owned();

        let size = u32::from_le_bytes(bytes[SIZE_OFFSET..SIZE_OFFSET + 4].try_into().unwrap());
        let first_blk =
            u16::from_le_bytes(bytes[FIRST_BLK_OFFSET..FIRST_BLK_OFFSET + 2].try_into().unwrap());
        let entry_type = EntryType::from_raw(bytes[TYPE_OFFSET]);
        let access = AccessRights(bytes[ACCESS_OFFSET]);

        Self {
            name,
            size,
            first_blk,
            entry_type,
            access,
        }
    }
}

/// A decoded 4096-byte directory block: 64 fixed-size entries.
pub struct DirBlock {
    entries: Vec<DirEntry>,
}

impl DirBlock {
    /// An all-empty block (slot 0 included) — callers that need the
    /// reserved `..`/`/` slot populated must set it explicitly.
    pub fn blank() -> Self {
        Self {
            entries: (0..ENTRIES_PER_DIR_BLOCK).map(|_| DirEntry::empty()).collect(),
        }
    }

    /// Freshly formatted root directory block: slot 0 is the
    /// self-referential `/` entry, slots 1..63 empty.
    pub fn new_root() -> Self {
        let mut block = Self::blank();
        block.entries[0] = DirEntry {
            name: "/".to_string(),
            size: 0,
            first_blk: 0,
            entry_type: EntryType::Dir,
            access: AccessRights::RWX,
        };
        block
    }

    /// Freshly formatted non-root directory block: slot 0 is `..` pointing
    /// at `parent_block`, slots 1..63 empty.
    pub fn new_child(parent_block: u16) -> Self {
        let mut block = Self::blank();
        block.entries[0] = DirEntry {
            name: "..".to_string(),
            size: 0,
            first_blk: parent_block,
            entry_type: EntryType::Dir,
            access: AccessRights::RWX,
        };
        block
    }

    pub fn load(device: &mut dyn BlockDevice, block: u16) -> FsResult<Self> {
        let raw = device.read_block(block)?;
        let entries = (0..ENTRIES_PER_DIR_BLOCK)
            .map(|i| {
                let start = i * DIR_ENTRY_SIZE;
                let mut bytes = [0u8; DIR_ENTRY_SIZE];
                bytes.copy_from_slice(&raw[start..start + DIR_ENTRY_SIZE]);
                DirEntry::from_bytes(&bytes)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn flush(&self, device: &mut dyn BlockDevice, block: u16) -> FsResult<()> {
        let mut raw: Block = [0u8; BLOCK_SIZE];
        for (i, entry) in self.entries.iter().enumerate() {
            let start = i * DIR_ENTRY_SIZE;
            raw[start..start + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        }
        device.write_block(block, &raw)
    }

    pub fn entry(&self, index: usize) -> &DirEntry {
        &self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, entry: DirEntry) {
        self.entries[index] = entry;
    }

    pub fn parent_link(&self) -> u16 {
        self.entries[0].first_blk
    }

    /// Iterate over non-empty entries, including slot 0.
    pub fn iter_non_empty(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.entry_type != EntryType::Empty)
    }

    /// Write `entry` into the lowest-index slot `k >= 1` whose type is
    /// `Empty`. Slot 0 is reserved.
    pub fn insert(&mut self, entry: DirEntry) -> FsResult<usize> {
        let slot = (1..ENTRIES_PER_DIR_BLOCK)
            .find(|&k| self.entries[k].entry_type == EntryType::Empty)
            .ok_or(FsError::DirectoryFull)?;
        self.entries[slot] = entry;
        Ok(slot)
    }

    /// Linear scan over all 64 slots; the first non-empty entry matching
    /// `name` byte-for-byte.
    pub fn find(&self, name: &str) -> Option<(usize, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.entry_type != EntryType::Empty && e.name == name)
    }

    pub fn mark_empty(&mut self, index: usize) {
        self.entries[index] = DirEntry::empty();
    }

    /// True iff every slot `k >= 1` has type `Empty` (slot 0 holds `..`/`/`
    /// and is ignored).
    pub fn is_empty_dir(&self) -> bool {
        self.entries[1..].iter().all(|e| e.entry_type == EntryType::Empty)
    }
}
