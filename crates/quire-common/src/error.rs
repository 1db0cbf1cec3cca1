//! Error types for Quire.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using QuireError.
pub type Result<T> = std::result::Result<T, QuireError>;

/// Errors that can occur in Quire operations.
#[derive(Debug, Error)]
pub enum QuireError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    // Buffer manager errors
    #[error("Buffer pool exceeded, every frame is pinned")]
    BufferExceeded,

    #[error("Page pinned: {page_id}")]
    PagePinned { page_id: PageId },

    #[error("Page not pinned: {page_id}")]
    PageNotPinned { page_id: PageId },

    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: PageId },

    #[error("Bad buffer in frame {frame_id}")]
    BadBuffer { frame_id: u32 },

    #[error("Frame index error: {0}")]
    Index(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}

impl QuireError {
    /// Returns true if the error came from the underlying file.
    pub fn is_io(&self) -> bool {
        matches!(self, QuireError::Io(_) | QuireError::IoError(_))
    }
}
