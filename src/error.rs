//! The tagged-variant error type returned at every engine and component
//! boundary. The source this was ported from threw exceptions internally and
//! translated them to `0`/`-1`/`-2`/`-3` integers at the shell; here the
//! `Result<_, TfsError>` chain *is* the interface, and only the reference
//! shell (`demos/shell.rs`) re-encodes it for the legacy wire protocol.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TfsError {
    #[error("malformed path: {0:?}")]
    InvalidPath(String),

    #[error("filesystem is not mounted")]
    NotMounted,

    #[error("filesystem is already mounted")]
    AlreadyMounted,

    #[error("path component not found or not a directory: {0:?}")]
    PathNotFound(String),

    #[error("not found: {0:?}")]
    NotFound(String),

    #[error("already exists: {0:?}")]
    DuplicateEntry(String),

    #[error("directory not empty: {0:?}")]
    DirNotEmpty(String),

    #[error("out of space: needed {needed}, {available} available")]
    OutOfSpace { needed: usize, available: usize },

    #[error("illegal FAT mutation at block {0}")]
    FatGuard(i64),

    #[error("bad open-file handle {0}")]
    BadHandle(i64),

    #[error("invalid read at block {0}")]
    InvalidRead(i64),

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    #[error("block device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block index {index} out of bounds (0..{bound})")]
    IoBounds { index: i64, bound: i64 },

    #[error("invalid directory byte buffer: {0}")]
    InvalidDirBytes(String),
}

pub type Result<T> = core::result::Result<T, TfsError>;
