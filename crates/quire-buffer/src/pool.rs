//! Page pool: the in-memory page buffers, index-aligned with the frame table.

use crate::frame::FrameId;
use quire_common::page::PAGE_SIZE;

/// Fixed array of page-sized buffers allocated once at construction.
pub struct PagePool {
    pages: Vec<Box<[u8; PAGE_SIZE]>>,
}

impl PagePool {
    /// Allocates `num_pages` zeroed buffers.
    pub fn new(num_pages: usize) -> Self {
        let pages = (0..num_pages).map(|_| Box::new([0u8; PAGE_SIZE])).collect();
        Self { pages }
    }

    /// Returns the number of buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns the buffer for a frame.
    #[inline]
    pub fn page(&self, frame_id: FrameId) -> &[u8; PAGE_SIZE] {
        &self.pages[frame_id.index()]
    }

    /// Returns the buffer for a frame, mutably.
    #[inline]
    pub fn page_mut(&mut self, frame_id: FrameId) -> &mut [u8; PAGE_SIZE] {
        &mut self.pages[frame_id.index()]
    }
}
