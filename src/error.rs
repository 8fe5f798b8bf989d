//! Error taxonomy for block-device, FAT, and file-system-level failures.
//!
//! Mirrors the layering of the on-disk design: a low-level I/O failure is
//! fatal and propagates unchanged; everything above it is a structural
//! refusal the caller can react to (permission denied, name collision, ...).

use std::fmt;
use std::io;

/// Errors surfaced by file system operations.
///
/// Every public operation in [`crate::fs::FileSystem`] returns
/// `Result<T, FsError>` instead of the sentinel `0`/`-1` codes of the
/// original implementation.
#[derive(Debug)]
pub enum FsError {
    /// Underlying block device failed; fatal to the operation in progress.
    Io(io::Error),

    /// Named file or directory does not exist.
    NotFound,

    /// Name collision on `create`/`mkdir`/`cp`/`mv`.
    AlreadyExists,

    /// Required read/write/execute bit missing on the relevant entry.
    PermissionDenied,

    /// Leaf name is 56 bytes or longer.
    NameTooLong,

    /// Parent directory block has no empty slot.
    DirectoryFull,

    /// FAT has insufficient free blocks for the requested allocation.
    NoSpace,

    /// `rm` on a non-empty directory.
    NotEmpty,

    /// Operation expected a file but found a directory.
    IsADirectory,

    /// Operation expected a directory but found a file.
    NotADirectory,

    /// Path resolver could not walk the given token sequence.
    InvalidPath,

    /// `rm` refused because the target is the current working directory.
    CannotRemoveCwd,

    /// `rm` refused because the target is the root directory.
    CannotRemoveRoot,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::NotFound => f.write_str("no such file or directory"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::NameTooLong => f.write_str("name too long"),
            Self::DirectoryFull => f.write_str("directory full"),
            Self::NoSpace => f.write_str("not enough free blocks on disk"),
            Self::NotEmpty => f.write_str("directory not empty"),
            Self::IsADirectory => f.write_str("is a directory"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::InvalidPath => f.write_str("invalid path"),
            Self::CannotRemoveCwd => f.write_str("cannot remove current working directory"),
            Self::CannotRemoveRoot => f.write_str("cannot remove root directory"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(value: io::Error) -> Self {
        // Preserve the original transport-layer failure while adapting to the FsError API.
        Self::Io(value)
    }
}

pub type FsResult<T> = Result<T, FsError>;
