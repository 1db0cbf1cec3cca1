//! Frame descriptor table entries.

use quire_common::page::{FileId, PageId};
use quire_common::FileRef;
use std::sync::Arc;

/// Unique identifier for a frame in the buffer pool.
///
/// Equal to the frame's position in the descriptor table and the page pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Returns the frame's position in the pool.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Bookkeeping for one slot of the buffer pool.
///
/// An unoccupied descriptor never has pins, a dirty mark or a reference bit.
pub struct FrameDesc {
    /// Frame identifier.
    frame_id: FrameId,
    /// The file owning the cached page.
    file: Option<FileRef>,
    /// Page number within `file`; meaningful only while valid.
    page_num: u32,
    /// Whether the frame holds a live page.
    valid: bool,
    /// Whether the page has been modified since it was read or last written.
    dirty: bool,
    /// Reference bit for clock replacement algorithm.
    referenced: bool,
    /// Number of users currently holding the page.
    pin_count: u32,
}

impl FrameDesc {
    /// Creates a new unoccupied descriptor.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            file: None,
            page_num: 0,
            valid: false,
            dirty: false,
            referenced: false,
            pin_count: 0,
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the owning file, if any.
    #[inline]
    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    /// Returns the ID of the owning file, if any.
    #[inline]
    pub fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(|f| f.file_id())
    }

    /// Returns the page number field.
    #[inline]
    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Returns the page held by this frame, if it is valid.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        match (&self.file, self.valid) {
            (Some(file), true) => Some(PageId::new(file.file_id(), self.page_num)),
            _ => None,
        }
    }

    /// Returns true if this frame holds a live page.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns true if the frame belongs to `file_id`, valid or not.
    #[inline]
    pub fn belongs_to(&self, file_id: FileId) -> bool {
        self.file_id() == Some(file_id)
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Increments the pin count and sets the reference bit.
    ///
    /// Returns the previous pin count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        let prev = self.pin_count;
        self.pin_count += 1;
        self.referenced = true;
        prev
    }

    /// Decrements the pin count.
    ///
    /// Returns the new pin count, or `None` without touching anything if the
    /// frame was not pinned.
    #[inline]
    pub fn unpin(&mut self) -> Option<u32> {
        if self.pin_count == 0 {
            return None;
        }
        self.pin_count -= 1;
        Some(self.pin_count)
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets or clears the dirty flag.
    #[inline]
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Returns the reference bit value.
    #[inline]
    pub fn reference_bit(&self) -> bool {
        self.referenced
    }

    /// Sets the reference bit.
    #[inline]
    pub fn set_reference_bit(&mut self, value: bool) {
        self.referenced = value;
    }

    /// Claims the frame for `page_num` of `file`.
    ///
    /// The frame comes back valid, clean, referenced and pinned once on behalf
    /// of the caller that asked for the page.
    pub fn set(&mut self, file: &FileRef, page_num: u32) {
        self.file = Some(Arc::clone(file));
        self.page_num = page_num;
        self.valid = true;
        self.dirty = false;
        self.referenced = true;
        self.pin_count = 1;
    }

    /// Resets the frame to the unoccupied state.
    #[inline]
    pub fn clear(&mut self) {
        self.file = None;
        self.page_num = 0;
        self.valid = false;
        self.dirty = false;
        self.referenced = false;
        self.pin_count = 0;
    }

    /// Drops occupancy while keeping the owning file recorded.
    ///
    /// Leaves the descriptor in the inconsistent state that flushing reports
    /// as a bad buffer.
    #[cfg(test)]
    pub(crate) fn invalidate_keep_file(&mut self) {
        self.valid = false;
    }
}

impl std::fmt::Debug for FrameDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDesc")
            .field("frame_id", &self.frame_id)
            .field("file_id", &self.file_id())
            .field("page_num", &self.page_num)
            .field("valid", &self.valid)
            .field("pin_count", &self.pin_count)
            .field("dirty", &self.dirty)
            .field("referenced", &self.referenced)
            .finish()
    }
}
