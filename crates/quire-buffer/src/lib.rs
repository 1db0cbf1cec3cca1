//! Buffer management for Quire.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size pool of frames allocated once at construction
//! - Clock eviction policy with second-chance reference bits
//! - Pin counting so held pages are never evicted
//! - Dirty page write-back before a frame is reused or the manager is dropped

mod frame;
mod index;
mod manager;
mod pool;
mod replacer;

pub use frame::{FrameDesc, FrameId};
pub use index::FrameIndex;
pub use manager::{BufMgr, BufMgrConfig, BufferPoolStats, PageRef};
pub use pool::PagePool;
pub use replacer::ClockReplacer;
