//! Buffer manager.

use crate::frame::{FrameDesc, FrameId};
use crate::index::FrameIndex;
use crate::pool::PagePool;
use crate::replacer::ClockReplacer;
use log::{debug, info, trace, warn};
use quire_common::page::{PAGE_SIZE, PageId};
use quire_common::{FileRef, QuireError, Result, StorageConfig};

/// Configuration for the buffer manager.
#[derive(Debug, Clone)]
pub struct BufMgrConfig {
    /// Number of frames in the pool.
    pub num_bufs: usize,
}

impl Default for BufMgrConfig {
    fn default() -> Self {
        Self { num_bufs: 1024 }
    }
}

impl From<&StorageConfig> for BufMgrConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            num_bufs: config.buffer_pool_pages,
        }
    }
}

/// Handle to a page resident in the buffer pool.
///
/// Obtained from [`BufMgr::fetch_page`] or [`BufMgr::new_page`] and used to
/// reach the page bytes while the caller holds its pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    frame_id: FrameId,
    page_id: PageId,
}

impl PageRef {
    /// Returns the frame holding the page.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page number within its file.
    pub fn page_num(&self) -> u32 {
        self.page_id.page_num
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of unoccupied frames.
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// Buffer manager.
///
/// Mediates all page access through a fixed pool of frames:
/// - Frame index from (file, page number) to frame
/// - Frame descriptor table with pin counts, dirty and reference bits
/// - Clock replacement for eviction, writing dirty victims back first
///
/// Operations take `&mut self`; to share a manager between threads, put it
/// behind a single mutex so the clock hand, the frame table and the index
/// change together.
pub struct BufMgr {
    /// Configuration.
    config: BufMgrConfig,
    /// Frame descriptor table, one entry per pool slot.
    frames: Vec<FrameDesc>,
    /// Page buffers, aligned with `frames`.
    pool: PagePool,
    /// Page ID to frame ID mapping.
    index: FrameIndex,
    /// Page replacement policy.
    replacer: ClockReplacer,
}

impl BufMgr {
    /// Creates a new buffer manager.
    pub fn new(config: BufMgrConfig) -> Result<Self> {
        let num_bufs = config.num_bufs;
        if num_bufs == 0 || num_bufs > u32::MAX as usize {
            return Err(QuireError::InvalidParameter {
                name: "num_bufs".to_string(),
                value: num_bufs.to_string(),
            });
        }

        let frames: Vec<_> = (0..num_bufs)
            .map(|i| FrameDesc::new(FrameId(i as u32)))
            .collect();

        info!(
            "buffer manager created with {} frames ({} KB)",
            num_bufs,
            num_bufs * PAGE_SIZE / 1024
        );

        Ok(Self {
            config,
            frames,
            pool: PagePool::new(num_bufs),
            index: FrameIndex::new(num_bufs),
            replacer: ClockReplacer::new(num_bufs),
        })
    }

    /// Creates a buffer manager with `num_bufs` frames.
    pub fn with_capacity(num_bufs: usize) -> Result<Self> {
        Self::new(BufMgrConfig { num_bufs })
    }

    /// Returns the number of frames in the pool.
    pub fn num_bufs(&self) -> usize {
        self.config.num_bufs
    }

    /// Writes a frame's page back through its owning file.
    fn write_back(frame: &FrameDesc, pool: &PagePool) -> Result<()> {
        let file = frame.file().ok_or(QuireError::BadBuffer {
            frame_id: frame.frame_id().0,
        })?;
        debug!(
            "flushing page {}:{} from {}",
            file.file_id(),
            frame.page_num(),
            frame.frame_id()
        );
        file.write_page(frame.page_num(), pool.page(frame.frame_id()))
    }

    /// Finds a frame for a new page, evicting its occupant if necessary.
    ///
    /// The returned frame is unoccupied and absent from the index. A dirty
    /// victim is written back first; if that write fails the victim stays
    /// resident and nothing is selected.
    fn allocate_frame(&mut self) -> Result<FrameId> {
        let Some(frame_id) = self.replacer.pick_victim(&mut self.frames) else {
            debug!("no evictable frame among {}", self.frames.len());
            return Err(QuireError::BufferExceeded);
        };

        let frame = &mut self.frames[frame_id.index()];
        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                Self::write_back(frame, &self.pool)?;
                frame.set_dirty(false);
            }
            match self.index.remove(old_page_id) {
                Ok(_) | Err(QuireError::PageNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            debug!("evicted page {} from {}", old_page_id, frame_id);
        }
        frame.clear();

        Ok(frame_id)
    }

    /// Fetches a page, reading it from its file on a miss.
    ///
    /// The page is pinned before being returned; every successful fetch must
    /// be paired with one [`BufMgr::unpin_page`].
    pub fn fetch_page(&mut self, file: &FileRef, page_num: u32) -> Result<PageRef> {
        let page_id = PageId::new(file.file_id(), page_num);

        if let Some(frame_id) = self.index.lookup(page_id)? {
            let frame = &mut self.frames[frame_id.index()];
            frame.pin();
            trace!("hit page {} in {}", page_id, frame_id);
            return Ok(PageRef { frame_id, page_id });
        }

        let frame_id = self.allocate_frame()?;
        debug!("miss page {}, loading into {}", page_id, frame_id);

        // The frame is unoccupied until the index accepts the page
        file.read_page(page_num, self.pool.page_mut(frame_id))?;
        self.index.insert(page_id, frame_id)?;
        self.frames[frame_id.index()].set(file, page_num);

        Ok(PageRef { frame_id, page_id })
    }

    /// Releases one pin on a page, optionally marking it dirty.
    ///
    /// Unpinning clean never clears an earlier dirty mark.
    pub fn unpin_page(&mut self, file: &FileRef, page_num: u32, dirty: bool) -> Result<()> {
        let page_id = PageId::new(file.file_id(), page_num);
        let frame_id = self
            .index
            .lookup(page_id)?
            .ok_or(QuireError::PageNotFound { page_id })?;

        let frame = &mut self.frames[frame_id.index()];
        if frame.unpin().is_none() {
            return Err(QuireError::PageNotPinned { page_id });
        }
        if dirty {
            frame.set_dirty(true);
        }

        trace!("unpinned page {} (dirty: {})", page_id, dirty);
        Ok(())
    }

    /// Allocates a new page in `file` and makes it resident.
    ///
    /// Returns the new page number and a pinned handle to its buffer, which
    /// holds whatever the file wrote into the page on allocation.
    pub fn new_page(&mut self, file: &FileRef) -> Result<(u32, PageRef)> {
        let page_num = file.allocate_page()?;
        let frame_id = self.allocate_frame()?;
        let page_id = PageId::new(file.file_id(), page_num);

        file.read_page(page_num, self.pool.page_mut(frame_id))?;
        self.index.insert(page_id, frame_id)?;
        self.frames[frame_id.index()].set(file, page_num);
        debug!("allocated page {} in {}", page_id, frame_id);

        Ok((page_num, PageRef { frame_id, page_id }))
    }

    /// Drops a page from the pool and releases it in its file.
    ///
    /// A resident page is discarded even if pinned and even if dirty.
    pub fn dispose_page(&mut self, file: &FileRef, page_num: u32) -> Result<()> {
        let page_id = PageId::new(file.file_id(), page_num);

        if let Some(frame_id) = self.index.lookup(page_id)? {
            let frame = &mut self.frames[frame_id.index()];
            if frame.is_pinned() {
                debug!(
                    "disposing page {} with {} pins outstanding",
                    page_id,
                    frame.pin_count()
                );
            }
            frame.clear();
        }

        match self.index.remove(page_id) {
            Ok(_) | Err(QuireError::PageNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        file.dispose_page(page_num)
    }

    /// Writes back and releases every frame holding a page of `file`.
    ///
    /// Stops at the first pinned page with `PagePinned`; frames handled before
    /// it stay flushed.
    pub fn flush_file(&mut self, file: &FileRef) -> Result<()> {
        let file_id = file.file_id();

        for frame in self.frames.iter_mut() {
            if !frame.belongs_to(file_id) {
                continue;
            }
            if !frame.is_valid() {
                return Err(QuireError::BadBuffer {
                    frame_id: frame.frame_id().0,
                });
            }

            let page_id = PageId::new(file_id, frame.page_num());
            if frame.is_pinned() {
                return Err(QuireError::PagePinned { page_id });
            }

            if frame.is_dirty() {
                Self::write_back(frame, &self.pool)?;
                frame.set_dirty(false);
            }

            match self.index.remove(page_id) {
                Ok(_) => {}
                Err(QuireError::PageNotFound { .. }) => {
                    return Err(QuireError::BadBuffer {
                        frame_id: frame.frame_id().0,
                    });
                }
                Err(e) => return Err(e),
            }
            frame.clear();
        }

        Ok(())
    }

    /// Writes back every dirty page without releasing any frame.
    ///
    /// Returns the number of pages written.
    pub fn flush_all(&mut self) -> Result<usize> {
        let mut flushed = 0;

        for frame in self.frames.iter_mut() {
            if frame.is_valid() && frame.is_dirty() {
                Self::write_back(frame, &self.pool)?;
                frame.set_dirty(false);
                flushed += 1;
            }
        }

        Ok(flushed)
    }

    /// Returns the frame currently holding `page`, checking the handle is not stale.
    fn resident_frame(&self, page: &PageRef) -> Result<FrameId> {
        match self.frames.get(page.frame_id.index()) {
            Some(frame) if frame.page_id() == Some(page.page_id) => Ok(page.frame_id),
            _ => Err(QuireError::PageNotFound {
                page_id: page.page_id,
            }),
        }
    }

    /// Returns the bytes of a resident page.
    pub fn page(&self, page: &PageRef) -> Result<&[u8; PAGE_SIZE]> {
        let frame_id = self.resident_frame(page)?;
        Ok(self.pool.page(frame_id))
    }

    /// Returns the bytes of a resident page for modification.
    ///
    /// Report the change by unpinning with `dirty` set.
    pub fn page_mut(&mut self, page: &PageRef) -> Result<&mut [u8; PAGE_SIZE]> {
        let frame_id = self.resident_frame(page)?;
        Ok(self.pool.page_mut(frame_id))
    }

    /// Checks if a page is in the buffer pool.
    pub fn contains(&self, file: &FileRef, page_num: u32) -> bool {
        self.index.contains(PageId::new(file.file_id(), page_num))
    }

    /// Returns the descriptor of a frame.
    pub fn frame(&self, frame_id: FrameId) -> Option<&FrameDesc> {
        self.frames.get(frame_id.index())
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut stats = BufferPoolStats {
            total_frames: self.frames.len(),
            free_frames: 0,
            used_frames: 0,
            pinned_frames: 0,
            dirty_frames: 0,
        };

        for frame in &self.frames {
            if !frame.is_valid() {
                stats.free_frames += 1;
                continue;
            }
            stats.used_frames += 1;
            if frame.is_pinned() {
                stats.pinned_frames += 1;
            }
            if frame.is_dirty() {
                stats.dirty_frames += 1;
            }
        }

        stats
    }
}

impl std::fmt::Display for BufMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "buffer pool: {} frames, clock hand at {}",
            self.frames.len(),
            self.replacer.hand()
        )?;
        for frame in &self.frames {
            match frame.page_id() {
                Some(page_id) => write!(f, "{}\tpage {}", frame.frame_id(), page_id)?,
                None => write!(f, "{}\t-", frame.frame_id())?,
            }
            write!(f, "\tpin_count: {}", frame.pin_count())?;
            if frame.is_valid() {
                write!(f, "\tvalid")?;
            }
            if frame.is_dirty() {
                write!(f, "\tdirty")?;
            }
            if frame.reference_bit() {
                write!(f, "\treferenced")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Drop for BufMgr {
    fn drop(&mut self) {
        for frame in &self.frames {
            if frame.is_valid() && frame.is_dirty() {
                if let Err(e) = Self::write_back(frame, &self.pool) {
                    warn!(
                        "dropping unwritten page {}:{} from {}: {}",
                        frame.file_id().unwrap_or_default(),
                        frame.page_num(),
                        frame.frame_id(),
                        e
                    );
                }
            }
        }
    }
}
