//! Buffer controller - composes the rope and the mapped blocks
//!
//! Readers get immutable rope snapshots through an RCU swap, so a
//! flatten-for-save can run against a stable tree while foreground edits
//! continue. Writers buffer edits in a lock-free queue and commit them in
//! batches. One logical writer per buffer is assumed; readers are free.

use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::block::{BlockSet, SyncMode};
use crate::counted::Atomic;
use crate::error::{Error, Result};
use crate::rope::{Node, Rope};
use crate::rows::{Row, RowMap};

/// Auto-flush pending edits after this many operations
const FLUSH_THRESHOLD: usize = 16;

/// Edit operations accepted by the buffered path.
#[derive(Clone, Debug)]
pub enum Edit {
    Append(Box<[u8]>),
    Delete { range: Range<usize> },
}

/// Mapped pages and the descriptor they borrow from. Field order matters:
/// the blocks must unmap before the file handle closes.
struct Backing {
    blocks: BlockSet,
    _file: File,
}

struct RowCache {
    map: RowMap,
    stale: bool,
}

/// One open text buffer: an editable rope, optionally backed by the mapped
/// pages of a file on disk.
pub struct Buffer {
    /// Current committed snapshot for readers (lock-free!)
    root: ArcSwapOption<Node<Atomic>>,
    /// Buffered edits waiting to be applied
    pending: SegQueue<Edit>,
    /// Approximate count of pending edits for auto-flush
    pending_count: AtomicUsize,
    /// Monotonic version counter
    version: AtomicU64,
    dirty: AtomicBool,
    rows: Mutex<RowCache>,
    backing: Option<Mutex<Backing>>,
}

impl Buffer {
    /// Detached buffer: empty rope, no backing file.
    pub fn empty() -> Self {
        Self {
            root: ArcSwapOption::empty(),
            pending: SegQueue::new(),
            pending_count: AtomicUsize::new(0),
            version: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            rows: Mutex::new(RowCache {
                map: RowMap::new(),
                stale: false,
            }),
            backing: None,
        }
    }

    /// Open `path` read/write, map every page and seed the rope with one
    /// leaf per page. Page bytes are copied out of the mapping once, so no
    /// rope node can outlive the mapping's validity window. On error
    /// nothing partial survives - whatever was mapped unmaps on the way
    /// out.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let blocks = BlockSet::map_file(&file)?;

        let mut rope: Rope = Rope::new();
        for block in blocks.blocks() {
            rope.append(block.bytes());
        }
        debug!(
            path = %path.display(),
            bytes = rope.byte_count(),
            pages = blocks.blocks().len(),
            "buffer opened"
        );

        Ok(Self {
            root: ArcSwapOption::new(rope.into_root()),
            pending: SegQueue::new(),
            pending_count: AtomicUsize::new(0),
            version: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            rows: Mutex::new(RowCache {
                map: RowMap::new(),
                stale: true,
            }),
            backing: Some(Mutex::new(Backing {
                blocks,
                _file: file,
            })),
        })
    }

    /// O(1) retained snapshot of the current committed content.
    pub fn snapshot(&self) -> Rope {
        Rope::from_root(self.root.load_full())
    }

    /// Committed byte length.
    pub fn byte_count(&self) -> usize {
        self.snapshot().byte_count()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn is_attached(&self) -> bool {
        self.backing.is_some()
    }

    /// Buffer an edit; commits automatically once enough accumulate.
    pub fn edit(&self, edit: Edit) {
        self.pending.push(edit);
        let count = self.pending_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count >= FLUSH_THRESHOLD {
            self.flush();
        }
    }

    /// Apply all pending edits and commit one new snapshot. A buffered
    /// delete whose range no longer fits is dropped whole - never a
    /// partially applied destructive edit.
    pub fn flush(&self) {
        let mut edits = Vec::new();
        while let Some(edit) = self.pending.pop() {
            edits.push(edit);
        }

        if edits.is_empty() {
            return;
        }

        self.pending_count.store(0, Ordering::Relaxed);

        let mut rope = self.snapshot();
        for edit in edits {
            match edit {
                Edit::Append(bytes) => rope.append(&bytes),
                Edit::Delete { range } => {
                    let count = range.end.saturating_sub(range.start);
                    if let Err(err) = rope.delete(range.start, count) {
                        warn!(%err, "dropping stale buffered delete");
                    }
                }
            }
        }
        self.commit(rope);
    }

    /// Append immediately; pending buffered edits are applied first so
    /// ordering is preserved.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.flush();
        let mut rope = self.snapshot();
        rope.append(bytes);
        self.commit(rope);
    }

    /// Delete immediately, surfacing the bounds error to the caller. The
    /// committed content is untouched on error.
    pub fn delete(&self, start: usize, count: usize) -> Result<()> {
        self.flush();
        let mut rope = self.snapshot();
        rope.delete(start, count)?;
        self.commit(rope);
        Ok(())
    }

    /// Row records for the renderer, rebuilt from the committed snapshot
    /// when edits have landed since the last call.
    pub fn rows(&self) -> Vec<Row> {
        let mut cache = self.rows.lock();
        if cache.stale {
            let flat = self.snapshot().flatten();
            cache.map.rebuild(&flat);
            cache.stale = false;
        }
        cache.map.rows().to_vec()
    }

    /// Persist current content: flatten the committed snapshot, copy it
    /// into the mapped extents (bounded - the file is never grown) and
    /// flush. Returns the bytes written to the mapping.
    pub fn save(&self, mode: SyncMode) -> Result<usize> {
        self.flush();
        let Some(backing) = &self.backing else {
            return Err(Error::Detached);
        };

        let flat = self.snapshot().flatten();
        let mut backing = backing.lock();
        let written = backing.blocks.write_back(&flat);
        backing.blocks.sync_all(written, mode)?;
        self.dirty.store(false, Ordering::Relaxed);
        debug!(written, ?mode, "buffer persisted");
        Ok(written)
    }

    /// Swap in a new committed snapshot and invalidate derived state.
    fn commit(&self, rope: Rope) {
        self.root.store(rope.into_root());
        self.version.fetch_add(1, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Relaxed);
        self.rows.lock().stale = true;
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::empty()
    }
}
