//! Frame index mapping (file, page number) to the frame caching it.

use crate::frame::FrameId;
use quire_common::page::PageId;
use quire_common::{QuireError, Result};

/// Sentinel value for empty key slots.
const EMPTY_KEY: u64 = u64::MAX;

/// Sentinel value for deleted key slots (tombstone).
const TOMBSTONE_KEY: u64 = u64::MAX - 1;

/// Value stored next to empty and deleted keys.
const EMPTY_FRAME: u32 = u32::MAX;

/// Smallest table allocated, whatever the requested capacity.
const MIN_TABLE_SIZE: usize = 16;

/// Open-addressing hash table with linear probing.
///
/// Keys are [`PageId`]s packed into a u64. The table is sized to a power of two
/// at least twice the number of live entries it accepts, so probe chains stay
/// short and an insert within capacity always finds a slot.
pub struct FrameIndex {
    /// Packed page IDs, or a sentinel.
    keys: Box<[u64]>,
    /// Frame IDs, aligned with `keys`.
    values: Box<[u32]>,
    /// Bitmask for table indexing (table size - 1).
    mask: usize,
    /// Maximum number of live entries.
    capacity: usize,
    /// Number of live entries.
    len: usize,
    /// Number of tombstoned slots.
    tombstones: usize,
}

impl FrameIndex {
    /// Creates an index able to hold `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let size = (capacity * 2).next_power_of_two().max(MIN_TABLE_SIZE);

        Self {
            keys: vec![EMPTY_KEY; size].into_boxed_slice(),
            values: vec![EMPTY_FRAME; size].into_boxed_slice(),
            mask: size - 1,
            capacity,
            len: 0,
            tombstones: 0,
        }
    }

    /// Packs a page ID, rejecting the values reserved for sentinels.
    #[inline]
    fn key_of(page_id: PageId) -> Result<u64> {
        let key = page_id.as_u64();
        if key == EMPTY_KEY || key == TOMBSTONE_KEY {
            return Err(QuireError::Index(format!(
                "page {} collides with a reserved key",
                page_id
            )));
        }
        Ok(key)
    }

    /// Computes table index for a key.
    #[inline(always)]
    fn hash_index(&self, key: u64) -> usize {
        // FxHash-style multiply, high bits folded down for distribution
        let hash = key.wrapping_mul(0x517cc1b727220a95);
        ((hash ^ (hash >> 32)) as usize) & self.mask
    }

    /// Returns the slot holding `key`, if present.
    fn find(&self, key: u64) -> Option<usize> {
        let mut idx = self.hash_index(key);

        for _ in 0..self.keys.len() {
            let stored_key = self.keys[idx];
            if stored_key == EMPTY_KEY {
                return None;
            }
            if stored_key == key {
                return Some(idx);
            }
            // Skip tombstones and continue probing
            idx = (idx + 1) & self.mask;
        }
        None
    }

    /// Looks up the frame caching a page.
    ///
    /// A miss is `Ok(None)`; an error means the lookup itself could not be
    /// performed.
    pub fn lookup(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let key = Self::key_of(page_id)?;
        Ok(self.find(key).map(|idx| FrameId(self.values[idx])))
    }

    /// Inserts a page ID to frame ID mapping.
    ///
    /// Fails if the page is already mapped or the index is at capacity.
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) -> Result<()> {
        let key = Self::key_of(page_id)?;

        if self.len >= self.capacity {
            return Err(QuireError::Index(format!(
                "index full with {} entries, cannot insert {}",
                self.len, page_id
            )));
        }

        let mut idx = self.hash_index(key);
        let mut slot = None;

        for _ in 0..self.keys.len() {
            let stored_key = self.keys[idx];
            if stored_key == key {
                return Err(QuireError::Index(format!("duplicate key {}", page_id)));
            }
            if stored_key == TOMBSTONE_KEY && slot.is_none() {
                slot = Some(idx);
            }
            if stored_key == EMPTY_KEY {
                slot = slot.or(Some(idx));
                break;
            }
            idx = (idx + 1) & self.mask;
        }

        let Some(slot) = slot else {
            return Err(QuireError::Index(format!("no free slot for {}", page_id)));
        };

        if self.keys[slot] == TOMBSTONE_KEY {
            self.tombstones -= 1;
        }
        self.keys[slot] = key;
        self.values[slot] = frame_id.0;
        self.len += 1;

        Ok(())
    }

    /// Removes a page ID mapping, returning the frame it pointed to.
    ///
    /// Fails with `PageNotFound` if the page is not mapped.
    pub fn remove(&mut self, page_id: PageId) -> Result<FrameId> {
        let key = Self::key_of(page_id)?;

        let Some(idx) = self.find(key) else {
            return Err(QuireError::PageNotFound { page_id });
        };

        let frame_id = FrameId(self.values[idx]);
        self.keys[idx] = TOMBSTONE_KEY;
        self.values[idx] = EMPTY_FRAME;
        self.len -= 1;
        self.tombstones += 1;

        if self.tombstones > self.keys.len() / 4 {
            self.rebuild();
        }

        Ok(frame_id)
    }

    /// Re-inserts live entries into a clean table, dropping tombstones.
    fn rebuild(&mut self) {
        let live: Vec<(u64, u32)> = self.raw_entries().collect();

        self.keys.fill(EMPTY_KEY);
        self.values.fill(EMPTY_FRAME);
        self.tombstones = 0;

        for (key, frame) in live {
            let mut idx = self.hash_index(key);
            while self.keys[idx] != EMPTY_KEY {
                idx = (idx + 1) & self.mask;
            }
            self.keys[idx] = key;
            self.values[idx] = frame;
        }
    }

    fn raw_entries(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.keys
            .iter()
            .zip(self.values.iter())
            .filter(|&(&key, _)| key != EMPTY_KEY && key != TOMBSTONE_KEY)
            .map(|(&key, &frame)| (key, frame))
    }

    /// Returns true if the page ID is in the table.
    pub fn contains(&self, page_id: PageId) -> bool {
        matches!(self.lookup(page_id), Ok(Some(_)))
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over all entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.raw_entries()
            .map(|(key, frame)| (PageId::from_u64(key), FrameId(frame)))
    }
}
