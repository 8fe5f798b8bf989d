//! Block device adapter (C1).
//!
//! Fixed-size block read/write against a backing image file. The image is a
//! regular file of exactly `BLOCK_SIZE * BLOCK_COUNT` bytes; block `i`
//! occupies byte range `[BLOCK_SIZE * i, BLOCK_SIZE * (i + 1))`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::FsResult;

/// Size in bytes of a single block, and the unit of every disk read/write.
pub const BLOCK_SIZE: usize = 4096;

/// Total number of blocks in the image. The FAT (one block of 16-bit
/// entries) can address exactly this many blocks.
pub const BLOCK_COUNT: u16 = 2048;

/// Block index of the root directory.
pub const ROOT_BLOCK: u16 = 0;

/// Block index of the FAT.
pub const FAT_BLOCK: u16 = 1;

/// A fixed-size block, read or written as a single unit.
pub type Block = [u8; BLOCK_SIZE];

/// Capability for fixed-size block I/O against a backing store.
///
/// Failures are fatal and propagate as [`FsError::Io`]; there is no partial
/// read or write.
pub trait BlockDevice {
    fn read_block(&mut self, block: u16) -> FsResult<Block>;
    fn write_block(&mut self, block: u16, buf: &Block) -> FsResult<()>;
}

/// Validate that `block` is addressable, independent of the backing store.
fn check_range(block: u16) -> FsResult<()> {
    if block >= BLOCK_COUNT {
        // Out-of-range access is a programming error in this crate, not a
        // reachable user input (every caller computes indices from the FAT
        // or directory entries, both bounded to BLOCK_COUNT).
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block index {block} out of range (0..{BLOCK_COUNT})"),
        )
        .into());
    }
    Ok(())
}

/// [`BlockDevice`] backed by a regular file, canonically named
/// `diskfile.bin`, of size exactly `BLOCK_SIZE * BLOCK_COUNT`.
///
/// Created (and zero-extended to full size) on first open if absent or
/// shorter than the expected image size.
pub struct FileBlockDevice {
    file: File,
}

impl FileBlockDevice {
    /// Open (creating if necessary) the image file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut device = Self { file };
        device.ensure_size()?;

        log::debug!("opened block device image at {}", path.display());
        Ok(device)
    }

    fn ensure_size(&mut self) -> FsResult<()> {
        let expected = BLOCK_SIZE as u64 * BLOCK_COUNT as u64;
        let actual = self.file.metadata()?.len();
        if actual < expected {
            self.file.set_len(expected)?;
        }
        Ok(())
    }

    fn seek_to(&mut self, block: u16) -> FsResult<()> {
        let offset = BLOCK_SIZE as u64 * block as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_block(&mut self, block: u16) -> FsResult<Block> {
        check_range(block)?;
        self.seek_to(block)?;

        let mut buf = [0u8; BLOCK_SIZE];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_block(&mut self, block: u16, buf: &Block) -> FsResult<()> {
        check_range(block)?;
        self.seek_to(block)?;
        self.file.write_all(buf)?;
        Ok(())
    }
}
