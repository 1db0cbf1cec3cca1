//! Quire common types, errors, and utilities.
//!
//! This crate provides the definitions shared by the storage and buffer crates:
//! page identity, the error taxonomy, configuration, and the paged file contract.

pub mod config;
pub mod error;
pub mod file;
pub mod page;

pub use config::StorageConfig;
pub use error::{QuireError, Result};
pub use file::{FileRef, PagedFile};
pub use page::{FileId, PAGE_SIZE, PageId};
