//! Path resolver (C4).
//!
//! Tokenizes a path string and walks the directory tree from a starting
//! block, enforcing `EXECUTE` on every directory hop. The resolver's job is
//! to find the block that contains (or will contain) the leaf name; callers
//! pop the last token before resolving and act on the leaf themselves.

use crate::block::{BlockDevice, ROOT_BLOCK};
use crate::dirblock::{DirBlock, EntryType};
use crate::error::{FsError, FsResult};

/// One token of a tokenized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Leading `/`: resolve from the root.
    Root,
    /// `..`: move to the parent.
    Parent,
    /// A plain path component.
    Name(String),
}

/// Tokenize a path string.
///
/// - A leading `/` emits [`PathToken::Root`].
/// - The remainder is split on `/`; empty components (including a trailing
///   slash) and `.` components are dropped; `..` components are kept as
///   [`PathToken::Parent`].
pub fn tokenize(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    let mut rest = path;

    if let Some(stripped) = path.strip_prefix('/') {
        tokens.push(PathToken::Root);
        rest = stripped;
    }

    for part in rest.split('/') {
        match part {
            "" | "." => continue,
            ".." => tokens.push(PathToken::Parent),
            name => tokens.push(PathToken::Name(name.to_string())),
        }
    }

    tokens
}

/// Walk `tokens` starting from `cwd`, returning the block index of the
/// directory that contains (or will contain) the leaf named by the last
/// token. An empty token list returns `cwd` unchanged.
pub fn resolve(device: &mut dyn BlockDevice, cwd: u16, tokens: &[PathToken]) -> FsResult<u16> {
    let mut current = cwd;

    for (i, token) in tokens.iter().enumerate() {
        let is_final = i == tokens.len() - 1;

        match token {
            PathToken::Root => {
                current = ROOT_BLOCK;
            }
            PathToken::Parent => {
                let block = DirBlock::load(device, current)?;
                current = block.parent_link();
            }
            PathToken::Name(name) => {
                let block = DirBlock::load(device, current)?;
                let (_, entry) = block.find(name).ok_or(FsError::InvalidPath)?;

                match entry.entry_type {
                    EntryType::File => {
                        if is_final {
                            return Ok(current);
                        }
                        return Err(FsError::NotADirectory);
                    }
                    EntryType::Dir => {
                        if !entry.access.can_execute() {
                            return Err(FsError::PermissionDenied);
                        }
                        current = entry.first_blk;
                    }
                    EntryType::Empty => unreachable!("find() never returns an empty entry"),
                }
            }
        }
    }

    Ok(current)
}
