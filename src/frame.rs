//! Per-frame state threaded through every stage.
//!
//! The controller produces one immutable [`FrameContext`] per frame; stages
//! read it and never mutate shared counters. History resources live in
//! [`HistorySlotPair`]s whose current/previous roles derive from the frame
//! epoch instead of being toggled in place.

use bitflags::bitflags;
use glam::Vec2;

use crate::progressive::RadiusState;

bitflags! {
    /// Why a frame discards accumulated history.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResetCause: u8 {
        const CAMERA_MOVED = 1 << 0;
        const FORCED = 1 << 1;
        const SCENE_RELOADING = 1 << 2;
        /// Set by the controller on frame 0.
        const FIRST_FRAME = 1 << 3;
    }
}

/// Slot selection for a frame epoch.
#[inline]
pub const fn curr_slot(epoch: u64) -> usize {
    (epoch & 1) as usize
}

/// The slot holding the previous frame's result.
#[inline]
pub const fn prev_slot(epoch: u64) -> usize {
    1 - curr_slot(epoch)
}

/// Frame counters and reset decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub frame_index: u64,
    /// Frames accumulated since the last reset (0 on a reset frame).
    pub accumulated_frames: u32,
    pub reset_history: bool,
    pub reset_causes: ResetCause,
    /// Position in the 8-entry jitter sequence.
    pub jitter_index: u32,
}

impl FrameState {
    #[inline]
    pub fn curr_slot(&self) -> usize {
        curr_slot(self.frame_index)
    }

    #[inline]
    pub fn prev_slot(&self) -> usize {
        prev_slot(self.frame_index)
    }
}

/// Everything a stage may know about the frame it runs in.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub state: FrameState,
    pub radius: RadiusState,
    /// Sub-pixel projection offset in pixels, each axis in [-0.5, 0.5).
    pub jitter: Vec2,
    /// Animation time in seconds.
    pub time: f32,
}

impl FrameContext {
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.state.frame_index
    }

    #[inline]
    pub fn reset_history(&self) -> bool {
        self.state.reset_history
    }
}

/// Two equally shaped resources of one history stream.
///
/// For epoch `e`, slot `e & 1` is the write target and the other slot holds
/// the result written during epoch `e - 1`.
#[derive(Debug, Clone)]
pub struct HistorySlotPair<T> {
    slots: [T; 2],
}

impl<T> HistorySlotPair<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { slots: [a, b] }
    }

    pub fn from_fn(mut f: impl FnMut() -> T) -> Self {
        Self { slots: [f(), f()] }
    }

    /// Write target and read-only history for `epoch`.
    pub fn split(&mut self, epoch: u64) -> (&mut T, &T) {
        let [a, b] = &mut self.slots;
        if curr_slot(epoch) == 0 {
            (a, &*b)
        } else {
            (b, &*a)
        }
    }

    #[inline]
    pub fn current(&self, epoch: u64) -> &T {
        &self.slots[curr_slot(epoch)]
    }

    #[inline]
    pub fn previous(&self, epoch: u64) -> &T {
        &self.slots[prev_slot(epoch)]
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_roles_follow_epoch() {
        for f in 0..64u64 {
            assert_ne!(curr_slot(f), prev_slot(f));
            assert_eq!(prev_slot(f + 1), curr_slot(f));
        }
    }

    #[test]
    fn test_split_writes_current_reads_previous() {
        let mut pair = HistorySlotPair::new(0u32, 0u32);
        for epoch in 0..6u64 {
            let (curr, prev) = pair.split(epoch);
            *curr = *prev + 1;
        }
        // Each epoch read the value written by the one before it.
        assert_eq!(*pair.current(5), 6);
        assert_eq!(*pair.previous(5), 5);
    }
}
