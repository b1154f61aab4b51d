//! Page-granular memory-mapped views of an open file
//!
//! A `MappedBlock` is one read/write page of the backing file, shared with
//! the file so flushed writes land in place. A `BlockSet` shards a whole
//! file into page blocks so content past the first page is never silently
//! truncated. Unmapping is `Drop`: a mapping is released on every exit
//! path, before the owning file handle can close.

use std::fs::File;

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Byte granule of the block manager.
pub const PAGE_SIZE: usize = 4096;

/// How `sync` waits on the write-back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Schedule the flush and return; only scheduling failures are reported.
    Async,
    /// Block until the modified range reaches the file.
    Sync,
}

/// One page-sized read/write window of an open file.
pub struct MappedBlock {
    map: MmapMut,
    page: u32,
}

impl MappedBlock {
    /// Map the page-size region at byte offset `(page - 1) * PAGE_SIZE`,
    /// clamped to the file's extent. Page numbers are 1-based; page 0 and
    /// pages past the end of the file are errors, and on any error nothing
    /// is left mapped.
    pub fn map_page(file: &File, page: u32) -> Result<Self> {
        if page < 1 {
            return Err(Error::InvalidPage(page));
        }
        let offset = u64::from(page - 1) * PAGE_SIZE as u64;
        let file_len = file.metadata()?.len();
        if offset >= file_len {
            return Err(Error::PageBeyondEof { page, file_len });
        }
        let len = ((file_len - offset) as usize).min(PAGE_SIZE);

        // SAFETY: the mapping is dropped before the file handle it borrows
        // from, and all access goes through the bounds-checked slice
        // accessors below.
        let map = unsafe { MmapOptions::new().offset(offset).len(len).map_mut(file)? };
        Ok(Self { map, page })
    }

    /// 1-based page number within the backing file.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Mapped byte length; `PAGE_SIZE` except for a short final page.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }

    /// Flush modified bytes in `[0, len)` (clamped to the mapped extent)
    /// back to the file.
    pub fn sync(&self, len: usize, mode: SyncMode) -> Result<()> {
        let len = len.min(self.map.len());
        match mode {
            SyncMode::Async => self.map.flush_async_range(0, len)?,
            SyncMode::Sync => self.map.flush_range(0, len)?,
        }
        Ok(())
    }
}

/// Every page of one open file, mapped in order.
pub struct BlockSet {
    blocks: Vec<MappedBlock>,
    file_len: u64,
}

impl BlockSet {
    /// Map the whole file, one block per page. An empty file maps no
    /// blocks. Fails atomically: an error tears down whatever was mapped.
    pub fn map_file(file: &File) -> Result<Self> {
        let file_len = file.metadata()?.len();
        let pages = file_len.div_ceil(PAGE_SIZE as u64) as u32;
        let mut blocks = Vec::with_capacity(pages as usize);
        for page in 1..=pages {
            blocks.push(MappedBlock::map_page(file, page)?);
        }
        debug!(pages, file_len, "mapped file pages");
        Ok(Self { blocks, file_len })
    }

    pub fn blocks(&self) -> &[MappedBlock] {
        &self.blocks
    }

    /// Length of the backing file at map time; also the total mapped bytes.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Copy `bytes` into the mapped extents in page order, bounded by the
    /// mapped extent - the file is never grown. Returns the bytes written.
    pub fn write_back(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        for block in &mut self.blocks {
            if written == bytes.len() {
                break;
            }
            let take = block.len().min(bytes.len() - written);
            block.bytes_mut()[..take].copy_from_slice(&bytes[written..written + take]);
            written += take;
        }
        if written < bytes.len() {
            warn!(
                dropped = bytes.len() - written,
                "content exceeds mapped extent; tail not written"
            );
        }
        written
    }

    /// Flush the first `len` bytes of content across the blocks covering
    /// them.
    pub fn sync_all(&self, len: usize, mode: SyncMode) -> Result<()> {
        let mut remaining = len;
        for block in &self.blocks {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(block.len());
            block.sync(take, mode)?;
            remaining -= take;
        }
        Ok(())
    }
}
