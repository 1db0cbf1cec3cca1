//! Clock page replacement.

use crate::frame::{FrameDesc, FrameId};

/// Clock replacement over the frame descriptor table.
///
/// The clock hand circles the table giving every referenced frame a second
/// chance: the first visit clears its reference bit, a later visit may pick it.
/// When selecting a victim, for each frame under the hand:
/// 1. Unoccupied: select it
/// 2. Referenced: clear the reference bit and advance
/// 3. Pinned: advance
/// 4. Otherwise: select it
///
/// A scan covers at most two full rotations, which is enough for every
/// unpinned frame to lose its reference bit and come around again.
#[derive(Debug)]
pub struct ClockReplacer {
    /// Total number of frames.
    num_frames: usize,
    /// Frame most recently under the hand.
    clock_hand: usize,
}

impl ClockReplacer {
    /// Creates a clock whose first scan starts at frame 0.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            clock_hand: num_frames.saturating_sub(1),
        }
    }

    /// Returns the total capacity.
    pub fn capacity(&self) -> usize {
        self.num_frames
    }

    /// Returns the frame most recently under the hand.
    pub fn hand(&self) -> FrameId {
        FrameId(self.clock_hand as u32)
    }

    #[inline]
    fn advance(&mut self) -> usize {
        self.clock_hand = (self.clock_hand + 1) % self.num_frames;
        self.clock_hand
    }

    /// Picks the next frame that may hold a new page.
    ///
    /// The returned frame is either unoccupied or an unpinned, unreferenced
    /// occupant the caller must evict. Returns `None` when two rotations found
    /// nothing, meaning every frame is pinned.
    pub fn pick_victim(&mut self, frames: &mut [FrameDesc]) -> Option<FrameId> {
        if self.num_frames == 0 {
            return None;
        }
        debug_assert_eq!(frames.len(), self.num_frames);

        for _ in 0..(2 * self.num_frames) {
            let hand = self.advance();
            let frame = &mut frames[hand];

            if !frame.is_valid() {
                return Some(frame.frame_id());
            }
            if frame.reference_bit() {
                // Second chance
                frame.set_reference_bit(false);
                continue;
            }
            if frame.is_pinned() {
                continue;
            }
            return Some(frame.frame_id());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_common::FileRef;
    use quire_storage::MemFile;
    use std::sync::Arc;

    /// Builds a table with every frame occupied, pinned once and referenced.
    fn occupied_frames(n: u32) -> Vec<FrameDesc> {
        let file: FileRef = Arc::new(MemFile::with_pages(0, n));
        (0..n)
            .map(|i| {
                let mut desc = FrameDesc::new(FrameId(i));
                desc.set(&file, i);
                desc
            })
            .collect()
    }

    fn unpin_all(frames: &mut [FrameDesc]) {
        for frame in frames.iter_mut() {
            frame.unpin();
        }
    }

    #[test]
    fn test_clock_replacer_new() {
        let replacer = ClockReplacer::new(10);
        assert_eq!(replacer.capacity(), 10);
        assert_eq!(replacer.hand(), FrameId(9));
    }

    #[test]
    fn test_empty_frames_taken_in_order() {
        let mut frames: Vec<_> = (0..3).map(|i| FrameDesc::new(FrameId(i))).collect();
        let mut replacer = ClockReplacer::new(3);

        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(0)));
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(1)));
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(2)));
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(0)));
    }

    #[test]
    fn test_all_referenced_unpinned_clears_then_picks_first() {
        let mut frames = occupied_frames(3);
        unpin_all(&mut frames);
        let mut replacer = ClockReplacer::new(3);

        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(0)));
        assert!(frames.iter().all(|f| !f.reference_bit()));
    }

    #[test]
    fn test_second_chance() {
        let mut frames = occupied_frames(3);
        unpin_all(&mut frames);
        for frame in frames.iter_mut() {
            frame.set_reference_bit(false);
        }
        frames[0].set_reference_bit(true);
        let mut replacer = ClockReplacer::new(3);

        // Frame 0 is spared once, frame 1 is taken
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(1)));
        assert!(!frames[0].reference_bit());
    }

    #[test]
    fn test_pinned_frames_skipped() {
        let mut frames = occupied_frames(4);
        frames[2].unpin();
        let mut replacer = ClockReplacer::new(4);

        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(2)));
        assert_eq!(replacer.hand(), FrameId(2));
    }

    #[test]
    fn test_all_pinned() {
        let mut frames = occupied_frames(3);
        let mut replacer = ClockReplacer::new(3);

        assert_eq!(replacer.pick_victim(&mut frames), None);
        // Reference bits were cleared on the way round
        assert!(frames.iter().all(|f| !f.reference_bit()));
        assert!(frames.iter().all(|f| f.pin_count() == 1));
    }

    #[test]
    fn test_hand_resumes_after_last_victim() {
        let mut frames = occupied_frames(4);
        unpin_all(&mut frames);
        for frame in frames.iter_mut() {
            frame.set_reference_bit(false);
        }
        let mut replacer = ClockReplacer::new(4);

        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(0)));
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(1)));
        frames[2].pin();
        assert_eq!(replacer.pick_victim(&mut frames), Some(FrameId(3)));
    }

    #[test]
    fn test_zero_frames() {
        let mut replacer = ClockReplacer::new(0);
        assert_eq!(replacer.pick_victim(&mut []), None);
    }
}
