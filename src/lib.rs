//! A hierarchical file system backed by a single fixed-size block device
//! image: a FAT-style allocation table over fixed blocks, directories as
//! single-block chains of fixed-size entries, and UNIX-shell-style
//! operations layered on top.

pub mod block;
pub mod dirblock;
pub mod error;
pub mod fat;
pub mod fs;
pub mod path;

pub use block::{BlockDevice, FileBlockDevice, Block, BLOCK_COUNT, BLOCK_SIZE, ROOT_BLOCK};
pub use dirblock::{AccessRights, DirEntry, EntryType};
pub use error::{FsError, FsResult};
pub use fs::FileSystem;
