//! Disk manager for page-level file I/O.

use log::debug;
use parking_lot::Mutex;
use quire_common::page::{FileId, PAGE_SIZE};
use quire_common::{PagedFile, QuireError, Result, StorageConfig};
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for data files.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

impl From<&StorageConfig> for DiskManagerConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// Hands out shared [`DiskFile`] handles, one per file ID.
///
/// Each file_id maps to a separate data file under the data directory.
pub struct DiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// Open file handles keyed by file_id.
    files: Mutex<HashMap<FileId, Arc<DiskFile>>>,
}

impl DiskManager {
    /// Creates a new disk manager.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Generates the file path for a given file ID.
    fn file_path(&self, file_id: FileId) -> PathBuf {
        self.config.data_dir.join(format!("{:08}.dat", file_id))
    }

    /// Opens or creates a data file, returning the shared handle.
    pub fn open_file(&self, file_id: FileId) -> Result<Arc<DiskFile>> {
        let mut files = self.files.lock();

        if let Some(handle) = files.get(&file_id) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(DiskFile::open(
            file_id,
            self.file_path(file_id),
            self.config.fsync_enabled,
        )?);
        files.insert(file_id, Arc::clone(&handle));

        Ok(handle)
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        let files = self.files.lock();
        for handle in files.values() {
            handle.sync()?;
        }
        Ok(())
    }

    /// Closes a specific file.
    ///
    /// Fails while any handle given out by [`DiskManager::open_file`] is still
    /// alive, so a later open never yields a second handle for the same file_id.
    pub fn close_file(&self, file_id: FileId) -> Result<()> {
        let mut files = self.files.lock();
        let Some(handle) = files.get(&file_id) else {
            return Ok(());
        };
        if Arc::strong_count(handle) > 1 {
            return Err(QuireError::IoError(format!(
                "file {} is still in use by {} handles",
                file_id,
                Arc::strong_count(handle) - 1
            )));
        }
        handle.sync()?;
        files.remove(&file_id);
        Ok(())
    }

    /// Closes all open files.
    pub fn close_all(&self) -> Result<()> {
        let mut files = self.files.lock();
        for (_, handle) in files.drain() {
            handle.sync()?;
        }
        Ok(())
    }

    /// Deletes a data file.
    pub fn delete_file(&self, file_id: FileId) -> Result<()> {
        self.close_file(file_id)?;
        let path = self.file_path(file_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}

/// A single data file accessed one page at a time.
///
/// Disposed page numbers are remembered for the lifetime of the handle and
/// handed out again by [`PagedFile::allocate_page`], lowest first.
pub struct DiskFile {
    file_id: FileId,
    path: PathBuf,
    fsync_enabled: bool,
    inner: Mutex<DiskFileInner>,
}

struct DiskFileInner {
    file: File,
    /// Number of pages in the file.
    num_pages: u32,
    /// Pages released by dispose_page and not yet reallocated.
    disposed: BTreeSet<u32>,
}

impl DiskFileInner {
    fn check_live(&self, file_id: FileId, page_num: u32) -> Result<()> {
        if page_num >= self.num_pages || self.disposed.contains(&page_num) {
            return Err(QuireError::IoError(format!(
                "page {} does not exist in file {}",
                page_num, file_id
            )));
        }
        Ok(())
    }

    fn write_at(&mut self, page_num: u32, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }
}

impl DiskFile {
    fn open(file_id: FileId, path: PathBuf, fsync_enabled: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;
        debug!("opened {} with {} pages", path.display(), num_pages);

        Ok(Self {
            file_id,
            path,
            fsync_enabled,
            inner: Mutex::new(DiskFileInner {
                file,
                num_pages,
                disposed: BTreeSet::new(),
            }),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages in the file, disposed ones included.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Forces written pages to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

impl PagedFile for DiskFile {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn allocate_page(&self) -> Result<u32> {
        let mut inner = self.inner.lock();

        let page_num = match inner.disposed.first() {
            Some(&page_num) => page_num,
            None => inner.num_pages,
        };

        // Zero the page so it reads back empty, extending the file if needed.
        // A disposed page stays reusable until the write goes through.
        inner.write_at(page_num, &[0u8; PAGE_SIZE])?;
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        inner.disposed.remove(&page_num);
        if page_num >= inner.num_pages {
            inner.num_pages = page_num + 1;
        }

        Ok(page_num)
    }

    fn read_page(&self, page_num: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(self.file_id, page_num)?;

        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(buf)?;

        Ok(())
    }

    fn write_page(&self, page_num: u32, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(self.file_id, page_num)?;

        inner.write_at(page_num, buf)?;
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        Ok(())
    }

    fn dispose_page(&self, page_num: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(self.file_id, page_num)?;
        inner.disposed.insert(page_num);
        Ok(())
    }
}
