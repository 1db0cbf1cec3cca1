//! Volatile in-memory paged file.

use parking_lot::Mutex;
use quire_common::page::{FileId, PAGE_SIZE};
use quire_common::{PagedFile, QuireError, Result};

/// A paged file held entirely in memory.
///
/// Besides serving as scratch storage, it records every page write and can be
/// told to fail reads or writes, which makes buffer manager behavior observable.
pub struct MemFile {
    file_id: FileId,
    inner: Mutex<MemFileInner>,
}

#[derive(Default)]
struct MemFileInner {
    /// Page contents; `None` marks a disposed page.
    pages: Vec<Option<Box<[u8; PAGE_SIZE]>>>,
    /// Page numbers in the order they were written.
    write_log: Vec<u32>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemFileInner {
    fn page(&self, file_id: FileId, page_num: u32) -> Result<&[u8; PAGE_SIZE]> {
        match self.pages.get(page_num as usize) {
            Some(Some(page)) => Ok(page),
            _ => Err(QuireError::IoError(format!(
                "page {} does not exist in file {}",
                page_num, file_id
            ))),
        }
    }
}

impl MemFile {
    /// Creates an empty file.
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            inner: Mutex::new(MemFileInner::default()),
        }
    }

    /// Creates a file with `num_pages` zeroed pages already allocated.
    pub fn with_pages(file_id: FileId, num_pages: u32) -> Self {
        let file = Self::new(file_id);
        {
            let mut inner = file.inner.lock();
            for _ in 0..num_pages {
                inner.pages.push(Some(Box::new([0u8; PAGE_SIZE])));
            }
        }
        file
    }

    /// Makes every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Returns the number of successful page writes.
    pub fn write_count(&self) -> usize {
        self.inner.lock().write_log.len()
    }

    /// Returns the page numbers written so far, oldest first.
    pub fn write_log(&self) -> Vec<u32> {
        self.inner.lock().write_log.clone()
    }

    /// Returns a copy of a live page's stored content.
    pub fn peek_page(&self, page_num: u32) -> Option<Box<[u8; PAGE_SIZE]>> {
        let inner = self.inner.lock();
        inner.page(self.file_id, page_num).ok().map(|p| Box::new(*p))
    }

    /// Returns the number of page slots, disposed ones included.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().pages.len() as u32
    }
}

impl PagedFile for MemFile {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn allocate_page(&self) -> Result<u32> {
        let mut inner = self.inner.lock();
        let fresh = Some(Box::new([0u8; PAGE_SIZE]));

        if let Some(slot) = inner.pages.iter().position(Option::is_none) {
            inner.pages[slot] = fresh;
            return Ok(slot as u32);
        }

        inner.pages.push(fresh);
        Ok(inner.pages.len() as u32 - 1)
    }

    fn read_page(&self, page_num: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(QuireError::IoError(format!(
                "injected read failure on page {} of file {}",
                page_num, self.file_id
            )));
        }
        buf.copy_from_slice(inner.page(self.file_id, page_num)?);
        Ok(())
    }

    fn write_page(&self, page_num: u32, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(QuireError::IoError(format!(
                "injected write failure on page {} of file {}",
                page_num, self.file_id
            )));
        }
        inner.page(self.file_id, page_num)?;
        if let Some(Some(page)) = inner.pages.get_mut(page_num as usize) {
            page.copy_from_slice(buf);
        }
        inner.write_log.push(page_num);
        Ok(())
    }

    fn dispose_page(&self, page_num: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.page(self.file_id, page_num)?;
        inner.pages[page_num as usize] = None;
        Ok(())
    }
}
