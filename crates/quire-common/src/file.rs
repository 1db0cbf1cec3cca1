//! The paged file contract consumed by the buffer manager.

use crate::error::Result;
use crate::page::{FileId, PAGE_SIZE};
use std::sync::Arc;

/// A file that stores fixed-size pages addressed by page number.
///
/// The buffer manager only ever touches a file through these operations and
/// compares files by [`PagedFile::file_id`]. Methods take `&self` so the same
/// handle can be held by the caller and by every frame caching one of its pages.
pub trait PagedFile: Send + Sync {
    /// Returns the identity of this file.
    fn file_id(&self) -> FileId;

    /// Reserves a new page and returns its number.
    fn allocate_page(&self) -> Result<u32>;

    /// Reads the on-disk content of a page into `buf`.
    fn read_page(&self, page_num: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Persists `buf` as the content of a page.
    fn write_page(&self, page_num: u32, buf: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Releases the storage of a page.
    fn dispose_page(&self, page_num: u32) -> Result<()>;
}

/// Shared handle to an open paged file.
pub type FileRef = Arc<dyn PagedFile>;
