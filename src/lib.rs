//! Editable text core: a reference-counted byte rope backed by
//! memory-mapped file pages.
//!
//! Open maps a file page by page, seeds the rope from the mapped bytes and
//! hands row records to the renderer; edits share unedited tree structure
//! across versions; save flattens the rope back into the mapped pages and
//! flushes them to disk. Terminal handling, key dispatch and rendering
//! live outside this crate and consume it through `Buffer`.

pub mod block;
pub mod buffer;
pub mod counted;
pub mod error;
pub mod rope;
pub mod rows;

// Re-export core types
pub use block::{BlockSet, MappedBlock, SyncMode, PAGE_SIZE};
pub use buffer::{Buffer, Edit};
pub use counted::{Atomic, Exclusive, RefCount};
pub use error::{Error, Result};
pub use rope::{Node, Rope};
pub use rows::{Row, RowMap};
