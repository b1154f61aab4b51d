//! Crate-wide error type
//!
//! Logical request errors (bad delete ranges) are kept distinguishable from
//! resource failures (open, map, sync) so callers can no-op the former and
//! abort the current operation on the latter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A delete range extends past the end of the rope. The rope is left
    /// unchanged when this is returned.
    #[error("range {start}..+{count} exceeds rope length {len}")]
    OutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },

    /// Page numbers are 1-based.
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(u32),

    /// The requested page starts at or past the end of the file.
    #[error("page {page} lies beyond end of file ({file_len} bytes)")]
    PageBeyondEof { page: u32, file_len: u64 },

    /// The buffer has no backing file to persist to.
    #[error("buffer is not attached to a file")]
    Detached,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
