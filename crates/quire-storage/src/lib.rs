//! Paged file implementations for Quire.
//!
//! This crate provides:
//! - Disk manager handing out page-granular OS files keyed by file ID
//! - In-memory paged file for tests and volatile storage

mod disk;
mod mem;

pub use disk::{DiskFile, DiskManager, DiskManagerConfig};
pub use mem::MemFile;
